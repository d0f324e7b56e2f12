//! Lock-free inbound batch queue
//!
//! Uses crossbeam-channel so the transport can deliver encoded batches from
//! any thread, while the engine drains them at one point per tick, before
//! local capture runs.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::net::protocol::{decode, encode, ActorBatch, EncodeError};

/// Encoded batch as received from the wire
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub bytes: Vec<u8>,
}

/// Bounded inbound queue
///
/// Multiple transport handlers can submit frames without blocking, and the
/// engine drains all pending frames at the start of each tick.
pub struct InboundQueue {
    /// Sender side - cloned to each transport handler
    sender: Sender<InboundFrame>,
    /// Receiver side - used by the tick loop
    receiver: Receiver<InboundFrame>,
    capacity: usize,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for a transport handler
    pub fn sender(&self) -> InboundSender {
        InboundSender {
            sender: self.sender.clone(),
        }
    }

    /// Drain and decode every pending frame
    ///
    /// Frames that fail to decode are dropped; the next tick's state
    /// supersedes them.
    pub fn drain(&self) -> DrainedBatches {
        let mut drained = DrainedBatches::default();
        for frame in self.receiver.try_iter() {
            drained.bytes += frame.bytes.len();
            match decode::<ActorBatch>(&frame.bytes) {
                Ok(batch) => drained.batches.push(batch),
                Err(e) => {
                    warn!("Dropping undecodable inbound frame: {}", e);
                    drained.rejected += 1;
                }
            }
        }
        drained
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Result of one drain
#[derive(Debug, Default)]
pub struct DrainedBatches {
    pub batches: Vec<ActorBatch>,
    pub rejected: usize,
    pub bytes: usize,
}

/// Clonable sender handle for transport handlers
#[derive(Clone)]
pub struct InboundSender {
    sender: Sender<InboundFrame>,
}

impl InboundSender {
    /// Submit raw bytes (non-blocking)
    #[inline]
    pub fn try_send_bytes(&self, bytes: Vec<u8>) -> Result<(), InboundError> {
        self.sender
            .try_send(InboundFrame { bytes })
            .map_err(|e| match e {
                TrySendError::Full(_) => InboundError::Full,
                TrySendError::Disconnected(_) => InboundError::Disconnected,
            })
    }

    /// Encode and submit a batch (non-blocking)
    pub fn try_send_batch(&self, batch: &ActorBatch) -> Result<usize, InboundError> {
        let bytes = encode(batch)?;
        let len = bytes.len();
        self.try_send_bytes(bytes)?;
        Ok(len)
    }
}

/// Inbound queue errors
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    /// Queue is full (backpressure)
    #[error("inbound queue full")]
    Full,
    /// Receiving engine is gone
    #[error("inbound queue disconnected")]
    Disconnected,
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
