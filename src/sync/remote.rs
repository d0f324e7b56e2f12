//! Inbound batch reconciliation
//!
//! Applies one facet batch to the partition it names. Each entry is handled
//! on its own: a failing entry is logged and counted, and the rest of the
//! batch still applies.
//!
//! In a partition this host is authority for, entries never create remote
//! records. They are applied through a transient record that is dropped
//! right after, and entries naming an actor simulated here are ignored.

use tracing::{debug, warn};

use crate::actor::facets::CellChangeFacet;
use crate::actor::identity::ActorIdentity;
use crate::actor::record::{ActorRecord, Ownership};
use crate::error::{SyncError, SyncResult};
use crate::net::protocol::{ActorBatch, ActorEntry, Facet, FacetKind};
use crate::partition::directory::PartitionDirectory;
use crate::partition::id::{HostId, PartitionId};
use crate::world::World;

/// Tally of one batch application
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Entries applied to a tracked or transient record
    pub applied: usize,
    /// Entries skipped because of an error
    pub skipped: usize,
    /// Cell changes naming the partition the actor is already in
    pub stale: usize,
    /// Entries naming an actor this host simulates
    pub ignored_local: usize,
    /// Remote records created for first-seen actors
    pub created: usize,
    /// Remote records turned into local ones
    pub promoted: usize,
    /// Remote records moved into another partition's remote set
    pub migrated: usize,
    /// Remote records dropped because their destination is not tracked here
    pub discarded: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: &BatchReport) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.stale += other.stale;
        self.ignored_local += other.ignored_local;
        self.created += other.created;
        self.promoted += other.promoted;
        self.migrated += other.migrated;
        self.discarded += other.discarded;
    }
}

enum EntryOutcome {
    Applied { created: bool },
    IgnoredLocal,
    Promoted,
    Migrated,
    Discarded,
}

pub struct RemoteReconciler<'a, W: World> {
    directory: &'a mut PartitionDirectory,
    world: &'a mut W,
    host: HostId,
}

impl<'a, W: World> RemoteReconciler<'a, W> {
    pub fn new(directory: &'a mut PartitionDirectory, world: &'a mut W, host: HostId) -> Self {
        Self {
            directory,
            world,
            host,
        }
    }

    pub fn apply(&mut self, batch: &ActorBatch) -> BatchReport {
        let mut report = BatchReport::default();
        let partition = &batch.partition;

        if !self.directory.is_active(partition) {
            if !self.world.is_partition_loaded(partition) {
                debug!(
                    kind = ?batch.kind,
                    partition = %partition,
                    entries = batch.len(),
                    "Ignoring batch for partition not loaded here"
                );
                report.skipped = batch.len();
                return report;
            }
            self.directory.activate(partition.clone());
        }

        let authoritative = self.directory.has_authority(partition, self.host);

        for entry in &batch.entries {
            match self.apply_entry(batch.kind, partition, authoritative, entry) {
                Ok(EntryOutcome::Applied { created }) => {
                    report.applied += 1;
                    if created {
                        report.created += 1;
                    }
                }
                Ok(EntryOutcome::IgnoredLocal) => report.ignored_local += 1,
                Ok(EntryOutcome::Promoted) => {
                    report.applied += 1;
                    report.promoted += 1;
                }
                Ok(EntryOutcome::Migrated) => {
                    report.applied += 1;
                    report.migrated += 1;
                }
                Ok(EntryOutcome::Discarded) => {
                    report.applied += 1;
                    report.discarded += 1;
                }
                Err(SyncError::StaleCommand { identity, partition }) => {
                    warn!(actor = %identity, partition = %partition, "Ignoring cell change into current partition");
                    report.stale += 1;
                }
                Err(e) => {
                    debug!(kind = ?batch.kind, actor = %entry.identity, error = %e, "Skipping actor entry");
                    report.skipped += 1;
                }
            }
        }

        report
    }

    fn apply_entry(
        &mut self,
        kind: FacetKind,
        partition: &PartitionId,
        authoritative: bool,
        entry: &ActorEntry,
    ) -> SyncResult<EntryOutcome> {
        let found = entry.facet.kind();
        if found != kind {
            return Err(SyncError::FacetMismatch {
                identity: entry.identity.clone(),
                expected: kind,
                found,
            });
        }

        if let Facet::CellChange(change) = &entry.facet {
            return self.apply_cell_change(partition, authoritative, &entry.identity, change);
        }

        if authoritative {
            if self.directory.is_local_in(partition, &entry.identity) {
                return Ok(EntryOutcome::IgnoredLocal);
            }
            if !kind.instantiates_remote() {
                return Err(SyncError::NotFound(entry.identity.clone()));
            }
            let mut transient = self.transient(partition, &entry.identity)?;
            apply_facet(&mut transient, &entry.facet, self.world)?;
            return Ok(EntryOutcome::Applied { created: false });
        }

        let created = self.ensure_remote(partition, &entry.identity, kind)?;
        let record = self
            .directory
            .remote_mut(partition, &entry.identity)
            .ok_or_else(|| SyncError::NotFound(entry.identity.clone()))?;
        apply_facet(record, &entry.facet, self.world)?;
        Ok(EntryOutcome::Applied { created })
    }

    fn apply_cell_change(
        &mut self,
        partition: &PartitionId,
        authoritative: bool,
        identity: &ActorIdentity,
        change: &CellChangeFacet,
    ) -> SyncResult<EntryOutcome> {
        if change.destination == *partition {
            return Err(SyncError::StaleCommand {
                identity: identity.clone(),
                partition: partition.clone(),
            });
        }

        let mut record = if authoritative {
            if self.directory.is_local_in(partition, identity) {
                return Ok(EntryOutcome::IgnoredLocal);
            }
            self.transient(partition, identity)?
        } else {
            self.ensure_remote(partition, identity, FacetKind::CellChange)?;
            self.directory
                .take_remote(partition, identity)
                .ok_or_else(|| SyncError::NotFound(identity.clone()))?
        };

        let destination = &change.destination;
        self.world.move_to_partition(record.entity, destination)?;
        record.partition = destination.clone();
        record.position = change.position;
        record.has_position_data = true;
        record.set_position(self.world)?;

        if self.directory.has_authority(destination, self.host) {
            debug!(actor = %identity, from = %partition, to = %destination, "Remote actor promoted to local");
            let local = record.promote_to_local(destination.clone());
            self.directory.insert_local(local)?;
            Ok(EntryOutcome::Promoted)
        } else if self.directory.is_active(destination) {
            debug!(actor = %identity, from = %partition, to = %destination, "Remote actor migrated");
            self.directory.insert_remote(record)?;
            Ok(EntryOutcome::Migrated)
        } else {
            debug!(actor = %identity, from = %partition, to = %destination, "Remote actor left tracked partitions");
            Ok(EntryOutcome::Discarded)
        }
    }

    /// Make sure a remote record exists for `identity` in `partition`
    ///
    /// Returns whether one had to be created.
    fn ensure_remote(
        &mut self,
        partition: &PartitionId,
        identity: &ActorIdentity,
        kind: FacetKind,
    ) -> SyncResult<bool> {
        let tracked = self
            .directory
            .locate(identity)
            .is_some_and(|l| l.partition == *partition && l.ownership == Ownership::Remote);
        if tracked {
            return Ok(false);
        }
        if !kind.instantiates_remote() {
            return Err(SyncError::NotFound(identity.clone()));
        }

        let entity = self
            .world
            .search_exact(partition, identity)
            .ok_or_else(|| SyncError::NotFound(identity.clone()))?;
        self.directory
            .insert_remote(ActorRecord::remote(identity.clone(), entity, partition.clone()))?;
        Ok(true)
    }

    /// Untracked record bound to the world entity, never inserted anywhere
    fn transient(&self, partition: &PartitionId, identity: &ActorIdentity) -> SyncResult<ActorRecord> {
        let entity = self
            .world
            .search_exact(partition, identity)
            .ok_or_else(|| SyncError::NotFound(identity.clone()))?;
        Ok(ActorRecord::remote(identity.clone(), entity, partition.clone()))
    }
}

/// Store a facet in a remote record and push it into the world
///
/// Position and stats are written straight through only on first receipt;
/// afterwards the per-tick remote update applies them.
fn apply_facet<W: World>(record: &mut ActorRecord, facet: &Facet, world: &mut W) -> SyncResult<()> {
    match facet {
        Facet::Position(position) => {
            record.position = *position;
            if !record.has_position_data {
                record.has_position_data = true;
                record.set_position(world)?;
            }
        }
        Facet::AnimFlags(flags) => record.anim_flags = *flags,
        Facet::AnimPlay(animation) => {
            record.animation = animation.clone();
            record.play_animation(world)?;
        }
        Facet::Speech(sound) => {
            record.sound = sound.clone();
            record.play_sound(world)?;
        }
        Facet::Death(death) => {
            record.death = *death;
            record.apply_death(world)?;
        }
        Facet::StatsDynamic(stats) => {
            record.stats = *stats;
            if !record.has_stats_dynamic_data {
                record.has_stats_dynamic_data = true;
                record.set_stats_dynamic(world)?;
            }
        }
        Facet::Equipment(equipment) => {
            record.equipment = (**equipment).clone();
            record.set_equipment(world)?;
        }
        Facet::Attack(attack) => {
            record.attack = attack.clone();
            record.apply_attack(world)?;
        }
        Facet::Cast(cast) => {
            record.cast = cast.clone();
            record.apply_cast(world)?;
        }
        Facet::SpellsActive(changes) => {
            record.apply_spells_active_changes(world, changes.clone())?;
        }
        Facet::Ai(ai) => {
            record.ai = ai.clone();
            record.set_ai(world)?;
        }
        // Routed to the cell change handler before reaching here
        Facet::CellChange(_) => {}
    }
    Ok(())
}
