//! Read-only accessors for scripting and automation
//!
//! Every lookup returns a `SyncResult`: unknown actors are `NotFound` and
//! indices past the end are `OutOfRangeIndex`, so callers can treat both as
//! an "invalid" value without anything faulting.

use crate::actor::facets::{
    ActiveEffect, ActiveSpell, AiDirective, EquipmentItem, PositionFacet, StatsDynamic,
    EQUIPMENT_SLOTS,
};
use crate::actor::identity::ActorIdentity;
use crate::actor::record::ActorRecord;
use crate::error::{SyncError, SyncResult};
use crate::partition::directory::PartitionDirectory;

pub struct ActorInspector<'a> {
    directory: &'a PartitionDirectory,
}

impl<'a> ActorInspector<'a> {
    pub fn new(directory: &'a PartitionDirectory) -> Self {
        Self { directory }
    }

    pub fn record(&self, identity: &ActorIdentity) -> SyncResult<&'a ActorRecord> {
        self.directory
            .actor(identity)
            .ok_or_else(|| SyncError::NotFound(identity.clone()))
    }

    pub fn position(&self, identity: &ActorIdentity) -> SyncResult<PositionFacet> {
        Ok(self.record(identity)?.position)
    }

    pub fn stats_dynamic(&self, identity: &ActorIdentity) -> SyncResult<StatsDynamic> {
        Ok(self.record(identity)?.stats)
    }

    pub fn is_dead(&self, identity: &ActorIdentity) -> SyncResult<bool> {
        Ok(self.record(identity)?.stats.dead)
    }

    pub fn equipment_count(&self) -> usize {
        EQUIPMENT_SLOTS
    }

    pub fn equipment_item(&self, identity: &ActorIdentity, slot: usize) -> SyncResult<&'a EquipmentItem> {
        at(&self.record(identity)?.equipment, slot)
    }

    pub fn active_spell_count(&self, identity: &ActorIdentity) -> SyncResult<usize> {
        Ok(self.record(identity)?.spells_active.len())
    }

    pub fn active_spell(&self, identity: &ActorIdentity, index: usize) -> SyncResult<&'a ActiveSpell> {
        at(&self.record(identity)?.spells_active, index)
    }

    pub fn active_effect(
        &self,
        identity: &ActorIdentity,
        spell: usize,
        effect: usize,
    ) -> SyncResult<&'a ActiveEffect> {
        at(&self.active_spell(identity, spell)?.effects, effect)
    }

    /// Spells in the last change set received for the actor
    pub fn spells_active_changes_count(&self, identity: &ActorIdentity) -> SyncResult<usize> {
        Ok(self.record(identity)?.spells_active_changes.spells.len())
    }

    pub fn spells_active_change(&self, identity: &ActorIdentity, index: usize) -> SyncResult<&'a ActiveSpell> {
        at(&self.record(identity)?.spells_active_changes.spells, index)
    }

    pub fn ai_directive(&self, identity: &ActorIdentity) -> SyncResult<&'a AiDirective> {
        Ok(&self.record(identity)?.ai)
    }
}

fn at<T>(items: &[T], index: usize) -> SyncResult<&T> {
    items.get(index).ok_or(SyncError::OutOfRangeIndex {
        index,
        len: items.len(),
    })
}
