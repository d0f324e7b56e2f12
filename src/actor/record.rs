//! Actor record: one actor's networked state plus its facet mutators
//!
//! A record is bound to a world entity. Mutators push the record's facet into
//! that entity; they write absolute state, so applying the same payload twice
//! leaves the entity as applying it once.

use crate::actor::facets::{
    empty_equipment, ActiveSpell, AiDirective, AnimFlagsFacet, AnimationPlay, Attack, Cast,
    DeathFacet, DrawState, Equipment, PositionFacet, SpellsAction, SpellsActiveChanges,
    StatsDynamic,
};
use crate::actor::identity::ActorIdentity;
use crate::error::SyncResult;
use crate::partition::id::PartitionId;
use crate::world::{EntityId, World};

/// Which kind of collection owns a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Simulated here and broadcast
    Local,
    /// Mirrored from the authoritative host
    Remote,
}

#[derive(Debug, Clone)]
pub struct ActorRecord {
    // === Binding ===
    pub identity: ActorIdentity,
    pub entity: EntityId,
    /// Partition the record believes the actor is in
    pub partition: PartitionId,
    pub ownership: Ownership,

    // === Facets ===
    pub position: PositionFacet,
    pub anim_flags: AnimFlagsFacet,
    pub animation: AnimationPlay,
    pub sound: String,
    pub stats: StatsDynamic,
    pub equipment: Equipment,
    pub spells_active: Vec<ActiveSpell>,
    /// Last change set received, kept for inspection
    pub spells_active_changes: SpellsActiveChanges,
    pub ai: AiDirective,
    pub attack: Attack,
    pub cast: Cast,
    pub death: DeathFacet,

    // === First-sight tracking ===
    pub has_position_data: bool,
    pub has_stats_dynamic_data: bool,
    /// Set once a local record's facets have been captured and sent
    pub has_sent_data: bool,
}

impl ActorRecord {
    pub fn new(
        identity: ActorIdentity,
        entity: EntityId,
        partition: PartitionId,
        ownership: Ownership,
    ) -> Self {
        Self {
            identity,
            entity,
            partition,
            ownership,
            position: PositionFacet::default(),
            anim_flags: AnimFlagsFacet::default(),
            animation: AnimationPlay::default(),
            sound: String::new(),
            stats: StatsDynamic::default(),
            equipment: empty_equipment(),
            spells_active: Vec::new(),
            spells_active_changes: SpellsActiveChanges::default(),
            ai: AiDirective::default(),
            attack: Attack::default(),
            cast: Cast::default(),
            death: DeathFacet::default(),
            has_position_data: false,
            has_stats_dynamic_data: false,
            has_sent_data: false,
        }
    }

    pub fn local(identity: ActorIdentity, entity: EntityId, partition: PartitionId) -> Self {
        Self::new(identity, entity, partition, Ownership::Local)
    }

    pub fn remote(identity: ActorIdentity, entity: EntityId, partition: PartitionId) -> Self {
        Self::new(identity, entity, partition, Ownership::Remote)
    }

    pub fn is_local(&self) -> bool {
        self.ownership == Ownership::Local
    }

    /// Build the local record that takes over from this remote one
    ///
    /// Every known facet is carried over so the first capture broadcasts the
    /// last state the previous authority reported, not defaults.
    pub fn promote_to_local(&self, partition: PartitionId) -> ActorRecord {
        ActorRecord {
            partition,
            ownership: Ownership::Local,
            has_sent_data: false,
            ..self.clone()
        }
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    pub fn set_position<W: World>(&self, world: &mut W) -> SyncResult<()> {
        world.write_position(self.entity, &self.position)
    }

    pub fn set_anim_flags<W: World>(&self, world: &mut W) -> SyncResult<()> {
        world.write_anim_flags(self.entity, &self.anim_flags)
    }

    pub fn play_animation<W: World>(&self, world: &mut W) -> SyncResult<()> {
        world.play_animation(self.entity, &self.animation)
    }

    pub fn play_sound<W: World>(&self, world: &mut W) -> SyncResult<()> {
        if self.sound.is_empty() {
            return Ok(());
        }
        world.play_sound(self.entity, &self.sound)
    }

    pub fn set_stats_dynamic<W: World>(&self, world: &mut W) -> SyncResult<()> {
        world.write_stats_dynamic(self.entity, &self.stats)
    }

    pub fn set_equipment<W: World>(&self, world: &mut W) -> SyncResult<()> {
        world.write_equipment(self.entity, &self.equipment)
    }

    pub fn set_ai<W: World>(&self, world: &mut W) -> SyncResult<()> {
        world.write_ai(self.entity, &self.ai)
    }

    pub fn apply_attack<W: World>(&self, world: &mut W) -> SyncResult<()> {
        world.apply_attack(self.entity, &self.attack)
    }

    /// Process the stored cast, raising the spell stance first if a previous
    /// anim flags update was missed
    pub fn apply_cast<W: World>(&mut self, world: &mut W) -> SyncResult<()> {
        if self.anim_flags.draw_state != DrawState::Spell {
            self.anim_flags.draw_state = DrawState::Spell;
            self.set_anim_flags(world)?;
        }
        world.apply_cast(self.entity, &self.cast)
    }

    pub fn apply_death<W: World>(&mut self, world: &mut W) -> SyncResult<()> {
        self.stats.dead = true;
        self.stats.health.current = 0.0;
        world.set_death_state(self.entity, self.death.death_state, self.death.instant)
    }

    /// Add spells from the pending change set, skipping ids already active
    pub fn add_spells_active<W: World>(&mut self, world: &mut W) -> SyncResult<()> {
        if self.spells_active_changes.spells.is_empty() {
            return Ok(());
        }
        for spell in &self.spells_active_changes.spells {
            if !self.spells_active.iter().any(|s| s.id == spell.id) {
                self.spells_active.push(spell.clone());
            }
        }
        world.write_active_spells(self.entity, &self.spells_active)
    }

    /// Remove every active spell whose id appears in the pending change set
    pub fn remove_spells_active<W: World>(&mut self, world: &mut W) -> SyncResult<()> {
        if self.spells_active_changes.spells.is_empty() {
            return Ok(());
        }
        let changes = &self.spells_active_changes.spells;
        self.spells_active
            .retain(|active| !changes.iter().any(|s| s.id == active.id));
        world.write_active_spells(self.entity, &self.spells_active)
    }

    /// Replace the active spells with the pending change set (deduplicated by id)
    pub fn set_spells_active<W: World>(&mut self, world: &mut W) -> SyncResult<()> {
        self.spells_active.clear();
        for spell in &self.spells_active_changes.spells {
            if !self.spells_active.iter().any(|s| s.id == spell.id) {
                self.spells_active.push(spell.clone());
            }
        }
        world.write_active_spells(self.entity, &self.spells_active)
    }

    /// Store a change set and dispatch on its action
    pub fn apply_spells_active_changes<W: World>(
        &mut self,
        world: &mut W,
        changes: SpellsActiveChanges,
    ) -> SyncResult<()> {
        let action = changes.action;
        self.spells_active_changes = changes;
        match action {
            SpellsAction::Add => self.add_spells_active(world),
            SpellsAction::Remove => self.remove_spells_active(world),
            SpellsAction::Set => self.set_spells_active(world),
        }
    }
}
