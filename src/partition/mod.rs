//! Spatial partitions, their authority and the actor sets they own

pub mod authority;
pub mod directory;
pub mod id;
pub mod local_set;
pub mod remote_set;

pub use authority::AuthorityPartition;
pub use directory::{ActorLocation, PartitionDirectory};
pub use id::{HostId, PartitionId};
pub use local_set::LocalActorSet;
pub use remote_set::RemoteActorSet;
