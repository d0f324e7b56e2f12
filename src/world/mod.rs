//! Simulation collaborator boundary
//!
//! The sync core never owns game objects. It resolves actors through a
//! [`World`], reads live state from it for local actors, and writes received
//! state into it for remote ones.

pub mod memory;

use smallvec::SmallVec;

use crate::actor::facets::{
    ActiveSpell, AiDirective, AnimFlagsFacet, AnimationPlay, Attack, Cast, Equipment,
    PositionFacet, StatsDynamic,
};
use crate::actor::identity::ActorIdentity;
use crate::error::SyncResult;
use crate::partition::id::PartitionId;

pub use memory::MemoryWorld;

/// Handle to a live world entity
pub type EntityId = u64;

/// One-shot things a local actor did since the last capture
#[derive(Debug, Clone, PartialEq)]
pub enum ActorEvent {
    AnimationPlayed(AnimationPlay),
    Spoke(String),
    Attacked(Attack),
    Cast(Cast),
}

/// Events are rare; most ticks an actor has none or one
pub type ActorEvents = SmallVec<[ActorEvent; 2]>;

/// Lookup service and facet reader/writer over the game world's object storage
pub trait World {
    /// Find the entity with this identity in the given partition's store
    fn search_exact(&self, partition: &PartitionId, identity: &ActorIdentity) -> Option<EntityId>;

    /// All actor entities currently stored in a partition
    fn actors_in(&self, partition: &PartitionId) -> Vec<EntityId>;

    fn identity_of(&self, entity: EntityId) -> Option<ActorIdentity>;

    fn partition_of(&self, entity: EntityId) -> Option<PartitionId>;

    fn is_enabled(&self, entity: EntityId) -> bool;

    fn is_deleted(&self, entity: EntityId) -> bool;

    /// Whether the partition's store is loaded on this host
    fn is_partition_loaded(&self, partition: &PartitionId) -> bool;

    /// Whether a player is currently inside the partition
    fn is_player_present(&self, partition: &PartitionId) -> bool;

    fn move_to_partition(&mut self, entity: EntityId, partition: &PartitionId) -> SyncResult<()>;

    fn read_position(&self, entity: EntityId) -> SyncResult<PositionFacet>;
    fn read_anim_flags(&self, entity: EntityId) -> SyncResult<AnimFlagsFacet>;
    fn read_stats_dynamic(&self, entity: EntityId) -> SyncResult<StatsDynamic>;
    fn read_equipment(&self, entity: EntityId) -> SyncResult<Equipment>;

    /// Take the events recorded for an entity since the previous call
    fn drain_events(&mut self, entity: EntityId) -> ActorEvents;

    fn write_position(&mut self, entity: EntityId, position: &PositionFacet) -> SyncResult<()>;
    fn write_anim_flags(&mut self, entity: EntityId, flags: &AnimFlagsFacet) -> SyncResult<()>;
    fn play_animation(&mut self, entity: EntityId, animation: &AnimationPlay) -> SyncResult<()>;
    fn play_sound(&mut self, entity: EntityId, sound: &str) -> SyncResult<()>;
    fn write_stats_dynamic(&mut self, entity: EntityId, stats: &StatsDynamic) -> SyncResult<()>;
    fn write_equipment(&mut self, entity: EntityId, equipment: &Equipment) -> SyncResult<()>;
    fn write_active_spells(&mut self, entity: EntityId, spells: &[ActiveSpell]) -> SyncResult<()>;
    fn write_ai(&mut self, entity: EntityId, ai: &AiDirective) -> SyncResult<()>;
    fn apply_attack(&mut self, entity: EntityId, attack: &Attack) -> SyncResult<()>;
    fn apply_cast(&mut self, entity: EntityId, cast: &Cast) -> SyncResult<()>;

    /// Queue a death state; `instant` skips the death animation and disables collision
    fn set_death_state(&mut self, entity: EntityId, death_state: i32, instant: bool) -> SyncResult<()>;
}
