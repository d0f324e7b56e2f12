//! In-memory world used by the demo host, tests and benches

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use crate::actor::facets::{
    empty_equipment, ActiveSpell, AiDirective, AnimFlagsFacet, AnimationPlay, Attack, Cast,
    DynamicStat, Equipment, PositionFacet, StatsDynamic,
};
use crate::actor::identity::ActorIdentity;
use crate::error::{SyncError, SyncResult};
use crate::partition::id::PartitionId;
use crate::util::FxHashMap;
use crate::world::{ActorEvent, ActorEvents, EntityId, World};

/// Default health/magicka/fatigue for spawned actors
const DEFAULT_STAT: f32 = 100.0;

/// A simulated actor entity
#[derive(Debug, Clone)]
pub struct MemoryEntity {
    pub identity: ActorIdentity,
    pub partition: PartitionId,
    pub enabled: bool,
    pub deleted: bool,
    pub position: PositionFacet,
    pub anim_flags: AnimFlagsFacet,
    pub stats: StatsDynamic,
    pub equipment: Equipment,
    pub active_spells: Vec<ActiveSpell>,
    pub ai: Option<AiDirective>,
    pub last_animation: Option<AnimationPlay>,
    pub last_sound: Option<String>,
    pub sounds_played: u32,
    pub attacks_received: u32,
    pub casts_received: u32,
    pub death_state: Option<i32>,
    pub death_animation_finished: bool,
    pub collision: bool,
    pending_events: ActorEvents,
}

impl MemoryEntity {
    fn new(identity: ActorIdentity, partition: PartitionId) -> Self {
        let full = DynamicStat::new(DEFAULT_STAT, DEFAULT_STAT);
        Self {
            identity,
            partition,
            enabled: true,
            deleted: false,
            position: PositionFacet::default(),
            anim_flags: AnimFlagsFacet::default(),
            stats: StatsDynamic {
                health: full,
                magicka: full,
                fatigue: full,
                dead: false,
            },
            equipment: empty_equipment(),
            active_spells: Vec::new(),
            ai: None,
            last_animation: None,
            last_sound: None,
            sounds_played: 0,
            attacks_received: 0,
            casts_received: 0,
            death_state: None,
            death_animation_finished: false,
            collision: true,
            pending_events: ActorEvents::new(),
        }
    }
}

/// Hash-map backed world store
#[derive(Debug, Default)]
pub struct MemoryWorld {
    entities: FxHashMap<EntityId, MemoryEntity>,
    loaded: HashSet<PartitionId, FxBuildHasher>,
    players: HashSet<PartitionId, FxBuildHasher>,
    next_entity: EntityId,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a partition's store as loaded
    pub fn load_partition(&mut self, partition: PartitionId) {
        self.loaded.insert(partition);
    }

    pub fn set_player_present(&mut self, partition: &PartitionId, present: bool) {
        if present {
            self.players.insert(partition.clone());
        } else {
            self.players.remove(partition);
        }
    }

    /// Spawn an actor entity; its partition is loaded as a side effect
    pub fn spawn(&mut self, identity: ActorIdentity, partition: PartitionId) -> EntityId {
        self.next_entity += 1;
        let id = self.next_entity;
        self.loaded.insert(partition.clone());
        self.entities.insert(id, MemoryEntity::new(identity, partition));
        id
    }

    pub fn entity(&self, entity: EntityId) -> Option<&MemoryEntity> {
        self.entities.get(&entity)
    }

    pub fn entity_mut(&mut self, entity: EntityId) -> Option<&mut MemoryEntity> {
        self.entities.get_mut(&entity)
    }

    /// Find an entity by identity in any partition
    pub fn find(&self, identity: &ActorIdentity) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| &e.identity == identity && !e.deleted)
            .map(|(id, _)| *id)
    }

    /// Record an event for the next local capture
    pub fn push_event(&mut self, entity: EntityId, event: ActorEvent) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.pending_events.push(event);
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn get(&self, entity: EntityId) -> SyncResult<&MemoryEntity> {
        self.entities.get(&entity).ok_or(SyncError::EntityGone(entity))
    }

    fn get_mut(&mut self, entity: EntityId) -> SyncResult<&mut MemoryEntity> {
        self.entities.get_mut(&entity).ok_or(SyncError::EntityGone(entity))
    }
}

impl World for MemoryWorld {
    fn search_exact(&self, partition: &PartitionId, identity: &ActorIdentity) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| &e.partition == partition && &e.identity == identity && !e.deleted)
            .map(|(id, _)| *id)
    }

    fn actors_in(&self, partition: &PartitionId) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| &e.partition == partition)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn identity_of(&self, entity: EntityId) -> Option<ActorIdentity> {
        self.entities.get(&entity).map(|e| e.identity.clone())
    }

    fn partition_of(&self, entity: EntityId) -> Option<PartitionId> {
        self.entities.get(&entity).map(|e| e.partition.clone())
    }

    fn is_enabled(&self, entity: EntityId) -> bool {
        self.entities.get(&entity).is_some_and(|e| e.enabled)
    }

    fn is_deleted(&self, entity: EntityId) -> bool {
        self.entities.get(&entity).map_or(true, |e| e.deleted)
    }

    fn is_partition_loaded(&self, partition: &PartitionId) -> bool {
        self.loaded.contains(partition)
    }

    fn is_player_present(&self, partition: &PartitionId) -> bool {
        self.players.contains(partition)
    }

    fn move_to_partition(&mut self, entity: EntityId, partition: &PartitionId) -> SyncResult<()> {
        self.loaded.insert(partition.clone());
        self.get_mut(entity)?.partition = partition.clone();
        Ok(())
    }

    fn read_position(&self, entity: EntityId) -> SyncResult<PositionFacet> {
        Ok(self.get(entity)?.position)
    }

    fn read_anim_flags(&self, entity: EntityId) -> SyncResult<AnimFlagsFacet> {
        Ok(self.get(entity)?.anim_flags)
    }

    fn read_stats_dynamic(&self, entity: EntityId) -> SyncResult<StatsDynamic> {
        Ok(self.get(entity)?.stats)
    }

    fn read_equipment(&self, entity: EntityId) -> SyncResult<Equipment> {
        Ok(self.get(entity)?.equipment.clone())
    }

    fn drain_events(&mut self, entity: EntityId) -> ActorEvents {
        self.entities
            .get_mut(&entity)
            .map(|e| std::mem::take(&mut e.pending_events))
            .unwrap_or_default()
    }

    fn write_position(&mut self, entity: EntityId, position: &PositionFacet) -> SyncResult<()> {
        self.get_mut(entity)?.position = *position;
        Ok(())
    }

    fn write_anim_flags(&mut self, entity: EntityId, flags: &AnimFlagsFacet) -> SyncResult<()> {
        self.get_mut(entity)?.anim_flags = *flags;
        Ok(())
    }

    fn play_animation(&mut self, entity: EntityId, animation: &AnimationPlay) -> SyncResult<()> {
        self.get_mut(entity)?.last_animation = Some(animation.clone());
        Ok(())
    }

    fn play_sound(&mut self, entity: EntityId, sound: &str) -> SyncResult<()> {
        let e = self.get_mut(entity)?;
        e.last_sound = Some(sound.to_string());
        e.sounds_played += 1;
        Ok(())
    }

    fn write_stats_dynamic(&mut self, entity: EntityId, stats: &StatsDynamic) -> SyncResult<()> {
        self.get_mut(entity)?.stats = *stats;
        Ok(())
    }

    fn write_equipment(&mut self, entity: EntityId, equipment: &Equipment) -> SyncResult<()> {
        self.get_mut(entity)?.equipment = equipment.clone();
        Ok(())
    }

    fn write_active_spells(&mut self, entity: EntityId, spells: &[ActiveSpell]) -> SyncResult<()> {
        self.get_mut(entity)?.active_spells = spells.to_vec();
        Ok(())
    }

    fn write_ai(&mut self, entity: EntityId, ai: &AiDirective) -> SyncResult<()> {
        self.get_mut(entity)?.ai = Some(ai.clone());
        Ok(())
    }

    fn apply_attack(&mut self, entity: EntityId, _attack: &Attack) -> SyncResult<()> {
        self.get_mut(entity)?.attacks_received += 1;
        Ok(())
    }

    fn apply_cast(&mut self, entity: EntityId, _cast: &Cast) -> SyncResult<()> {
        self.get_mut(entity)?.casts_received += 1;
        Ok(())
    }

    fn set_death_state(&mut self, entity: EntityId, death_state: i32, instant: bool) -> SyncResult<()> {
        let e = self.get_mut(entity)?;
        e.death_state = Some(death_state);
        if instant {
            e.death_animation_finished = true;
            e.collision = false;
        }
        Ok(())
    }
}
