use std::time::Duration;

use crate::partition::id::{HostId, PartitionId};
use crate::partition::local_set::LocalActorSet;
use crate::partition::remote_set::RemoteActorSet;

/// An active partition: its authority and the actors tracked in it
#[derive(Debug)]
pub struct AuthorityPartition {
    id: PartitionId,
    authority: Option<HostId>,
    pub(crate) local: LocalActorSet,
    pub(crate) remote: RemoteActorSet,
    /// Time accumulated since the last local capture
    update_timer: Duration,
}

impl AuthorityPartition {
    pub fn new(id: PartitionId) -> Self {
        Self {
            id,
            authority: None,
            local: LocalActorSet::default(),
            remote: RemoteActorSet::default(),
            update_timer: Duration::ZERO,
        }
    }

    pub fn id(&self) -> &PartitionId {
        &self.id
    }

    pub fn authority(&self) -> Option<HostId> {
        self.authority
    }

    /// Whether `host` is the authority here
    pub fn has_authority(&self, host: HostId) -> bool {
        self.authority == Some(host)
    }

    pub(crate) fn set_authority(&mut self, host: Option<HostId>) {
        self.authority = host;
    }

    pub fn local(&self) -> &LocalActorSet {
        &self.local
    }

    pub fn remote(&self) -> &RemoteActorSet {
        &self.remote
    }

    pub fn actor_count(&self) -> usize {
        self.local.len() + self.remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }

    /// Advance the capture gate; true when a capture should run now
    ///
    /// A forced capture always runs and restarts the gate.
    pub(crate) fn capture_due(&mut self, dt: Duration, interval: Duration, force: bool) -> bool {
        if !force {
            self.update_timer += dt;
            if self.update_timer < interval {
                return false;
            }
        }
        self.update_timer = Duration::ZERO;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_authority() {
        let host = Uuid::new_v4();
        let mut partition = AuthorityPartition::new(PartitionId::exterior(0, 0));
        assert!(!partition.has_authority(host));

        partition.set_authority(Some(host));
        assert!(partition.has_authority(host));
        assert!(!partition.has_authority(Uuid::new_v4()));
    }

    #[test]
    fn test_capture_gate() {
        let interval = Duration::from_millis(25);
        let mut partition = AuthorityPartition::new(PartitionId::exterior(0, 0));

        assert!(!partition.capture_due(Duration::from_millis(10), interval, false));
        assert!(!partition.capture_due(Duration::from_millis(10), interval, false));
        assert!(partition.capture_due(Duration::from_millis(10), interval, false));
        // Gate restarted
        assert!(!partition.capture_due(Duration::from_millis(10), interval, false));
        assert!(partition.capture_due(Duration::ZERO, interval, true));
        assert!(!partition.capture_due(Duration::from_millis(24), interval, false));
    }
}
