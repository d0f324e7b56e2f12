//! Wire protocol, batching and transport plumbing

pub mod inbound;
pub mod outbox;
pub mod protocol;
pub mod transport;

pub use inbound::{InboundQueue, InboundSender};
pub use outbox::ActorOutbox;
pub use protocol::{ActorBatch, ActorEntry, Facet, FacetKind};
pub use transport::{ChannelTransport, RecordingTransport, Transport, TransportError};
