//! Reconciliation of local and remote actor state

pub mod engine;
pub mod inspect;
pub mod remote;

pub use engine::{CaptureReport, SyncEngine, TickReport};
pub use inspect::ActorInspector;
pub use remote::{BatchReport, RemoteReconciler};
