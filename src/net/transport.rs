//! Outbound transport seam
//!
//! The engine hands each flushed batch to a [`Transport`]. Delivery is best
//! effort: a batch that fails to go out is superseded by the next capture.

use tracing::trace;

use crate::net::inbound::{InboundError, InboundSender};
use crate::net::protocol::{encode, ActorBatch, EncodeError};

/// Sends actor batches to peers
pub trait Transport {
    /// Send a batch; `broadcast_to_others` targets every other host, and
    /// `skip_self` keeps it from looping back to this host's inbox
    ///
    /// Every peer is attempted; an error reports the first peer that missed it.
    fn send_batch(
        &mut self,
        batch: &ActorBatch,
        broadcast_to_others: bool,
        skip_self: bool,
    ) -> Result<usize, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("peer {peer} rejected batch: {source}")]
    Peer {
        peer: usize,
        #[source]
        source: InboundError,
    },
}

// ============================================================================
// In-process channel transport
// ============================================================================

/// Delivers encoded batches straight into peer engines' inbound queues
#[derive(Clone, Default)]
pub struct ChannelTransport {
    peers: Vec<InboundSender>,
    /// This host's own inbox, used when a batch is not sent with `skip_self`
    loopback: Option<InboundSender>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(mut self, peer: InboundSender) -> Self {
        self.peers.push(peer);
        self
    }

    pub fn with_loopback(mut self, own: InboundSender) -> Self {
        self.loopback = Some(own);
        self
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

impl Transport for ChannelTransport {
    fn send_batch(
        &mut self,
        batch: &ActorBatch,
        broadcast_to_others: bool,
        skip_self: bool,
    ) -> Result<usize, TransportError> {
        let bytes = encode(batch)?;
        let mut sent = 0;
        let mut first_error = None;

        if broadcast_to_others {
            // A full peer must not starve the ones after it
            for (peer, sender) in self.peers.iter().enumerate() {
                match sender.try_send_bytes(bytes.clone()) {
                    Ok(()) => sent += bytes.len(),
                    Err(source) if first_error.is_none() => {
                        first_error = Some(TransportError::Peer { peer, source });
                    }
                    Err(_) => {}
                }
            }
        }
        if !skip_self {
            if let Some(own) = &self.loopback {
                // Losing our own echo is harmless
                if own.try_send_bytes(bytes.clone()).is_ok() {
                    sent += bytes.len();
                }
            }
        }

        trace!(kind = ?batch.kind, partition = %batch.partition, entries = batch.len(), sent, "Batch sent");
        match first_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }
}

// ============================================================================
// Recording transport
// ============================================================================

/// One call to [`Transport::send_batch`]
#[derive(Debug, Clone)]
pub struct SentBatch {
    pub batch: ActorBatch,
    pub broadcast_to_others: bool,
    pub skip_self: bool,
}

/// Keeps every batch it is given; used by tests and benches
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Vec<SentBatch>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far
    pub fn take(&mut self) -> Vec<ActorBatch> {
        self.sent.drain(..).map(|s| s.batch).collect()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl Transport for RecordingTransport {
    fn send_batch(
        &mut self,
        batch: &ActorBatch,
        broadcast_to_others: bool,
        skip_self: bool,
    ) -> Result<usize, TransportError> {
        self.sent.push(SentBatch {
            batch: batch.clone(),
            broadcast_to_others,
            skip_self,
        });
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::facets::PositionFacet;
    use crate::actor::identity::ActorIdentity;
    use crate::net::inbound::InboundQueue;
    use crate::net::protocol::{Facet, FacetKind};
    use crate::partition::id::PartitionId;

    fn batch() -> ActorBatch {
        ActorBatch::new(FacetKind::Position, PartitionId::exterior(0, 0)).with_entry(
            ActorIdentity::new(1, 0, "nix_hound"),
            Facet::Position(PositionFacet::default()),
        )
    }

    #[test]
    fn test_channel_transport_broadcast_skips_self() {
        let own = InboundQueue::new(8);
        let peer_a = InboundQueue::new(8);
        let peer_b = InboundQueue::new(8);
        let mut transport = ChannelTransport::new()
            .with_peer(peer_a.sender())
            .with_peer(peer_b.sender())
            .with_loopback(own.sender());

        let sent = transport.send_batch(&batch(), true, true).unwrap();

        assert!(sent > 0);
        assert_eq!(peer_a.drain().batches, vec![batch()]);
        assert_eq!(peer_b.drain().batches, vec![batch()]);
        assert!(own.is_empty());
    }

    #[test]
    fn test_channel_transport_loopback() {
        let own = InboundQueue::new(8);
        let peer = InboundQueue::new(8);
        let mut transport = ChannelTransport::new()
            .with_peer(peer.sender())
            .with_loopback(own.sender());

        transport.send_batch(&batch(), false, false).unwrap();

        assert!(peer.is_empty());
        assert_eq!(own.pending_count(), 1);
    }

    #[test]
    fn test_channel_transport_full_peer() {
        let slow = InboundQueue::new(1);
        let healthy = InboundQueue::new(8);
        let mut transport = ChannelTransport::new()
            .with_peer(slow.sender())
            .with_peer(healthy.sender());

        transport.send_batch(&batch(), true, true).unwrap();
        let err = transport.send_batch(&batch(), true, true).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Peer { peer: 0, source: InboundError::Full }
        ));

        // The peer after the full one still got both batches
        assert_eq!(slow.pending_count(), 1);
        assert_eq!(healthy.pending_count(), 2);
    }

    #[test]
    fn test_recording_transport() {
        let mut transport = RecordingTransport::new();
        transport.send_batch(&batch(), true, true).unwrap();
        assert_eq!(transport.len(), 1);
        assert!(transport.sent[0].broadcast_to_others);
        assert_eq!(transport.take(), vec![batch()]);
        assert!(transport.is_empty());
    }
}
