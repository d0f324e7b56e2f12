//! Cellsync Library
//!
//! Actor state synchronization for a world split into cells. Each cell has
//! at most one authority host; that host simulates the cell's actors and
//! broadcasts their state, every other host mirrors it. Actors crossing a
//! cell border are handed to the destination cell's authority.
//!
//! # Layout
//!
//! - `partition` - authority partitions, local/remote actor sets and the directory over them
//! - `sync` - the per-tick engine, inbound batch reconciliation and read-only inspection
//! - `net` - facet batches, outbound grouping, inbound queue and transport seam
//! - `world` - the simulation boundary the core reads from and writes into

pub mod actor;
pub mod config;
pub mod error;
pub mod metrics;
pub mod net;
pub mod partition;
pub mod sync;
pub mod util;
pub mod world;

pub use actor::{ActorIdentity, ActorRecord, Ownership};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use partition::{HostId, PartitionDirectory, PartitionId};
pub use sync::{ActorInspector, SyncEngine};
pub use world::{MemoryWorld, World};
