//! Registry of active partitions and the actor index
//!
//! Every tracked actor has exactly one index entry naming the partition and
//! the kind of set that owns its record. All moves go through this type so the
//! index and the sets never disagree.

use tracing::{debug, info, warn};

use crate::actor::identity::ActorIdentity;
use crate::actor::record::{ActorRecord, Ownership};
use crate::error::{SyncError, SyncResult};
use crate::net::outbox::ActorOutbox;
use crate::partition::authority::AuthorityPartition;
use crate::partition::id::{HostId, PartitionId};
use crate::partition::local_set::{CaptureOutcome, CaptureStats};
use crate::util::FxHashMap;
use crate::world::World;

/// Where an actor's record lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorLocation {
    pub partition: PartitionId,
    pub ownership: Ownership,
}

#[derive(Debug, Default)]
pub struct PartitionDirectory {
    partitions: FxHashMap<PartitionId, AuthorityPartition>,
    index: FxHashMap<ActorIdentity, ActorLocation>,
}

impl PartitionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Partitions
    // ========================================================================

    /// Activate a partition, returning it whether or not it was already active
    pub fn activate(&mut self, id: PartitionId) -> &mut AuthorityPartition {
        self.partitions.entry(id).or_insert_with_key(|id| {
            info!(partition = %id, "Partition activated");
            AuthorityPartition::new(id.clone())
        })
    }

    pub fn is_active(&self, id: &PartitionId) -> bool {
        self.partitions.contains_key(id)
    }

    /// Tear down a partition, destroying every record it owns
    ///
    /// Returns how many records were destroyed, or `None` if it was not active.
    pub fn deactivate(&mut self, id: &PartitionId) -> Option<usize> {
        let mut partition = self.partitions.remove(id)?;
        let mut destroyed = 0;
        for record in partition
            .local
            .drain_all()
            .into_iter()
            .chain(partition.remote.drain_all())
        {
            self.index.remove(&record.identity);
            destroyed += 1;
        }
        info!(partition = %id, destroyed, "Partition deactivated");
        Some(destroyed)
    }

    pub fn get(&self, id: &PartitionId) -> Option<&AuthorityPartition> {
        self.partitions.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &PartitionId) -> Option<&mut AuthorityPartition> {
        self.partitions.get_mut(id)
    }

    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.partitions.keys().cloned().collect()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Active partitions with no tracked actors and no player inside
    pub fn idle_partitions<W: World>(&self, world: &W) -> Vec<PartitionId> {
        self.partitions
            .values()
            .filter(|p| p.is_empty() && !world.is_player_present(p.id()))
            .map(|p| p.id().clone())
            .collect()
    }

    // ========================================================================
    // Authority
    // ========================================================================

    /// Whether `host` is the authority of an active partition
    pub fn has_authority(&self, id: &PartitionId, host: HostId) -> bool {
        self.partitions
            .get(id)
            .is_some_and(|p| p.has_authority(host))
    }

    pub fn authority(&self, id: &PartitionId) -> Option<HostId> {
        self.partitions.get(id).and_then(|p| p.authority())
    }

    /// Reassign a partition's authority
    ///
    /// Records are not migrated; callers reconcile the sets afterwards.
    pub fn set_authority(&mut self, id: &PartitionId, host: HostId) -> SyncResult<()> {
        let partition = self
            .partitions
            .get_mut(id)
            .ok_or_else(|| SyncError::InactivePartition(id.clone()))?;
        if partition.authority() != Some(host) {
            info!(partition = %id, authority = %host, "Authority assigned");
        }
        partition.set_authority(Some(host));
        Ok(())
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Insert a record into its partition's local set
    pub fn insert_local(&mut self, record: ActorRecord) -> SyncResult<()> {
        self.insert(record, Ownership::Local)
    }

    /// Insert a record into its partition's remote set
    pub fn insert_remote(&mut self, record: ActorRecord) -> SyncResult<()> {
        self.insert(record, Ownership::Remote)
    }

    fn insert(&mut self, mut record: ActorRecord, ownership: Ownership) -> SyncResult<()> {
        if !self.partitions.contains_key(&record.partition) {
            return Err(SyncError::InactivePartition(record.partition));
        }

        if let Some(previous) = self.evict(&record.identity) {
            debug!(
                actor = %record.identity,
                from = %previous.partition,
                to = %record.partition,
                "Replacing existing record"
            );
        }

        record.ownership = ownership;
        let partition = self
            .partitions
            .get_mut(&record.partition)
            .ok_or_else(|| SyncError::InactivePartition(record.partition.clone()))?;
        self.index.insert(
            record.identity.clone(),
            ActorLocation {
                partition: record.partition.clone(),
                ownership,
            },
        );
        match ownership {
            Ownership::Local => partition.local.insert(record),
            Ownership::Remote => partition.remote.insert(record),
        };
        Ok(())
    }

    /// Remove a local record from a specific partition
    pub fn take_local(&mut self, partition: &PartitionId, identity: &ActorIdentity) -> Option<ActorRecord> {
        self.take(partition, identity, Ownership::Local)
    }

    /// Remove a remote record from a specific partition
    pub fn take_remote(&mut self, partition: &PartitionId, identity: &ActorIdentity) -> Option<ActorRecord> {
        self.take(partition, identity, Ownership::Remote)
    }

    fn take(
        &mut self,
        partition: &PartitionId,
        identity: &ActorIdentity,
        ownership: Ownership,
    ) -> Option<ActorRecord> {
        let location = self.index.get(identity)?;
        if location.partition != *partition || location.ownership != ownership {
            return None;
        }
        self.evict(identity)
    }

    /// Remove an actor's record from wherever it lives
    pub fn evict(&mut self, identity: &ActorIdentity) -> Option<ActorRecord> {
        let location = self.index.remove(identity)?;
        let partition = self.partitions.get_mut(&location.partition)?;
        match location.ownership {
            Ownership::Local => partition.local.remove(identity),
            Ownership::Remote => partition.remote.remove(identity),
        }
    }

    /// Destroy every local record of a partition
    pub fn clear_local(&mut self, id: &PartitionId) -> usize {
        let Some(partition) = self.partitions.get_mut(id) else {
            return 0;
        };
        let records = partition.local.drain_all();
        for record in &records {
            self.index.remove(&record.identity);
        }
        records.len()
    }

    /// Destroy every remote record of a partition
    pub fn clear_remote(&mut self, id: &PartitionId) -> usize {
        let Some(partition) = self.partitions.get_mut(id) else {
            return 0;
        };
        let records = partition.remote.drain_all();
        for record in &records {
            self.index.remove(&record.identity);
        }
        records.len()
    }

    pub(crate) fn remote_mut(
        &mut self,
        partition: &PartitionId,
        identity: &ActorIdentity,
    ) -> Option<&mut ActorRecord> {
        self.partitions.get_mut(partition)?.remote.get_mut(identity)
    }

    pub(crate) fn local_mut(
        &mut self,
        partition: &PartitionId,
        identity: &ActorIdentity,
    ) -> Option<&mut ActorRecord> {
        self.partitions.get_mut(partition)?.local.get_mut(identity)
    }

    /// Run a partition's local capture; every actor it drops is unindexed
    pub(crate) fn capture_local<W: World>(
        &mut self,
        id: &PartitionId,
        world: &mut W,
        force: bool,
        outbox: &mut ActorOutbox,
    ) -> (Vec<CaptureOutcome>, CaptureStats) {
        let Some(partition) = self.partitions.get_mut(id) else {
            return (Vec::new(), CaptureStats::default());
        };
        let (outcomes, stats) = partition.local.capture(world, id, force, outbox);
        for outcome in &outcomes {
            let identity = match outcome {
                CaptureOutcome::Departed { record, .. } => &record.identity,
                CaptureOutcome::Deleted(identity) => identity,
            };
            self.index.remove(identity);
        }
        (outcomes, stats)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn locate(&self, identity: &ActorIdentity) -> Option<&ActorLocation> {
        self.index.get(identity)
    }

    pub fn is_local_actor(&self, identity: &ActorIdentity) -> bool {
        self.index
            .get(identity)
            .is_some_and(|l| l.ownership == Ownership::Local)
    }

    pub fn is_remote_actor(&self, identity: &ActorIdentity) -> bool {
        self.index
            .get(identity)
            .is_some_and(|l| l.ownership == Ownership::Remote)
    }

    /// Whether the actor is simulated here within a specific partition
    pub fn is_local_in(&self, partition: &PartitionId, identity: &ActorIdentity) -> bool {
        self.index
            .get(identity)
            .is_some_and(|l| l.ownership == Ownership::Local && l.partition == *partition)
    }

    pub fn local_actor(&self, identity: &ActorIdentity) -> Option<&ActorRecord> {
        let location = self.index.get(identity)?;
        if location.ownership != Ownership::Local {
            return None;
        }
        self.partitions.get(&location.partition)?.local.get(identity)
    }

    pub fn remote_actor(&self, identity: &ActorIdentity) -> Option<&ActorRecord> {
        let location = self.index.get(identity)?;
        if location.ownership != Ownership::Remote {
            return None;
        }
        self.partitions.get(&location.partition)?.remote.get(identity)
    }

    /// Record for an actor regardless of ownership
    pub fn actor(&self, identity: &ActorIdentity) -> Option<&ActorRecord> {
        self.local_actor(identity).or_else(|| self.remote_actor(identity))
    }

    pub fn actor_count(&self) -> usize {
        self.index.len()
    }

    pub fn local_count(&self) -> usize {
        self.partitions.values().map(|p| p.local.len()).sum()
    }

    pub fn remote_count(&self) -> usize {
        self.partitions.values().map(|p| p.remote.len()).sum()
    }

    /// Check that the index and the sets agree exactly
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut tracked = 0;
        for (id, partition) in &self.partitions {
            let sets = [
                (Ownership::Local, partition.local.iter().collect::<Vec<_>>()),
                (Ownership::Remote, partition.remote.iter().collect::<Vec<_>>()),
            ];
            for (ownership, records) in sets {
                for record in records {
                    tracked += 1;
                    if record.partition != *id {
                        return Err(format!(
                            "{} is stored in {} but believes it is in {}",
                            record.identity, id, record.partition
                        ));
                    }
                    if record.ownership != ownership {
                        return Err(format!(
                            "{} is stored as {:?} but tagged {:?}",
                            record.identity, ownership, record.ownership
                        ));
                    }
                    let expected = ActorLocation {
                        partition: id.clone(),
                        ownership,
                    };
                    match self.index.get(&record.identity) {
                        Some(location) if *location == expected => {}
                        Some(location) => {
                            return Err(format!(
                                "{} indexed at {} ({:?}) but stored in {} ({:?})",
                                record.identity,
                                location.partition,
                                location.ownership,
                                id,
                                ownership
                            ));
                        }
                        None => return Err(format!("{} is not indexed", record.identity)),
                    }
                }
            }
        }

        if tracked != self.index.len() {
            warn!(tracked, indexed = self.index.len(), "Directory index out of step");
            return Err(format!(
                "{} records stored but {} indexed",
                tracked,
                self.index.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;
    use uuid::Uuid;

    fn record(n: u32, partition: &PartitionId) -> ActorRecord {
        ActorRecord::remote(ActorIdentity::new(n, 0, "mudcrab"), n as u64, partition.clone())
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut dir = PartitionDirectory::new();
        let cell = PartitionId::exterior(0, 0);
        let host = Uuid::new_v4();

        dir.activate(cell.clone()).set_authority(Some(host));
        dir.activate(cell.clone());

        assert_eq!(dir.partition_count(), 1);
        assert!(dir.has_authority(&cell, host));
    }

    #[test]
    fn test_insert_requires_active_partition() {
        let mut dir = PartitionDirectory::new();
        let cell = PartitionId::exterior(0, 0);
        assert_eq!(
            dir.insert_remote(record(1, &cell)),
            Err(SyncError::InactivePartition(cell.clone()))
        );
        assert!(dir.set_authority(&cell, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_uniqueness_across_partitions() {
        let mut dir = PartitionDirectory::new();
        let a = PartitionId::exterior(0, 0);
        let b = PartitionId::exterior(0, 1);
        dir.activate(a.clone());
        dir.activate(b.clone());

        dir.insert_remote(record(1, &a)).unwrap();
        dir.insert_local(record(1, &b)).unwrap();

        let id = ActorIdentity::new(1, 0, "mudcrab");
        assert!(dir.is_local_actor(&id));
        assert!(!dir.is_remote_actor(&id));
        assert!(dir.get(&a).unwrap().is_empty());
        assert_eq!(dir.get(&b).unwrap().local().len(), 1);
        assert_eq!(dir.actor_count(), 1);
        dir.check_invariants().unwrap();
    }

    #[test]
    fn test_take_checks_location() {
        let mut dir = PartitionDirectory::new();
        let a = PartitionId::exterior(0, 0);
        dir.activate(a.clone());
        dir.insert_remote(record(1, &a)).unwrap();
        let id = ActorIdentity::new(1, 0, "mudcrab");

        assert!(dir.take_local(&a, &id).is_none());
        assert!(dir.take_remote(&PartitionId::exterior(5, 5), &id).is_none());

        let taken = dir.take_remote(&a, &id).unwrap();
        assert_eq!(taken.identity, id);
        assert!(dir.locate(&id).is_none());
        dir.check_invariants().unwrap();
    }

    #[test]
    fn test_deactivate_removes_index_entries() {
        let mut dir = PartitionDirectory::new();
        let a = PartitionId::exterior(0, 0);
        dir.activate(a.clone());
        dir.insert_remote(record(1, &a)).unwrap();
        dir.insert_local(record(2, &a)).unwrap();

        assert_eq!(dir.deactivate(&a), Some(2));
        assert_eq!(dir.actor_count(), 0);
        assert!(!dir.is_active(&a));
        assert_eq!(dir.deactivate(&a), None);
        dir.check_invariants().unwrap();
    }

    #[test]
    fn test_clear_sets() {
        let mut dir = PartitionDirectory::new();
        let a = PartitionId::exterior(0, 0);
        dir.activate(a.clone());
        dir.insert_remote(record(1, &a)).unwrap();
        dir.insert_local(record(2, &a)).unwrap();
        dir.insert_local(record(3, &a)).unwrap();

        assert_eq!(dir.clear_remote(&a), 1);
        assert_eq!(dir.clear_local(&a), 2);
        assert_eq!(dir.actor_count(), 0);
        dir.check_invariants().unwrap();
    }

    #[test]
    fn test_idle_partitions() {
        let mut world = MemoryWorld::new();
        let mut dir = PartitionDirectory::new();
        let empty = PartitionId::exterior(0, 0);
        let visited = PartitionId::exterior(1, 0);
        let busy = PartitionId::exterior(2, 0);
        for id in [&empty, &visited, &busy] {
            dir.activate(id.clone());
        }
        world.set_player_present(&visited, true);
        dir.insert_remote(record(1, &busy)).unwrap();

        assert_eq!(dir.idle_partitions(&world), vec![empty]);
    }

    #[test]
    fn test_lookup_by_ownership() {
        let mut dir = PartitionDirectory::new();
        let a = PartitionId::interior("Ald-ruhn, Manor District");
        dir.activate(a.clone());
        dir.insert_local(record(4, &a)).unwrap();
        let id = ActorIdentity::new(4, 0, "mudcrab");

        assert!(dir.local_actor(&id).is_some());
        assert!(dir.remote_actor(&id).is_none());
        assert!(dir.is_local_in(&a, &id));
        assert!(dir.is_local_in(&PartitionId::interior("ald-ruhn, manor district"), &id));
        assert_eq!(dir.actor(&id).unwrap().ownership, Ownership::Local);
    }
}
