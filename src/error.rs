//! Error kinds for actor reconciliation
//!
//! None of these abort a batch: per-actor processing returns a `SyncError`,
//! the batch loop logs it and moves on to the next entry.

use crate::actor::identity::ActorIdentity;
use crate::net::protocol::FacetKind;
use crate::partition::id::PartitionId;

/// Errors produced while reconciling actor state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Identity unresolved in the world or the directory
    #[error("actor {0} not found")]
    NotFound(ActorIdentity),
    /// World entity handle no longer resolves
    #[error("entity {0} no longer exists")]
    EntityGone(u64),
    /// Cell change that names the partition the actor is already in
    #[error("actor {identity} reported moving to {partition}, which it is already in")]
    StaleCommand {
        identity: ActorIdentity,
        partition: PartitionId,
    },
    /// Facet index past the end of the collection
    #[error("index {index} out of range (len {len})")]
    OutOfRangeIndex { index: usize, len: usize },
    /// Partition is not active in the directory
    #[error("partition {0} is not active")]
    InactivePartition(PartitionId),
    /// Entry carries a facet that does not belong to the batch kind
    #[error("entry for {identity} carries a {found:?} facet in a {expected:?} batch")]
    FacetMismatch {
        identity: ActorIdentity,
        expected: FacetKind,
        found: FacetKind,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;
