//! Per-partition buffer of captured facets, flushed as one batch per kind

use crate::actor::identity::ActorIdentity;
use crate::net::protocol::{ActorBatch, ActorEntry, Facet, FacetKind};
use crate::partition::id::PartitionId;
use crate::util::FxHashMap;

/// Kinds only received from the authority, never captured locally
const NON_CAPTURE_KINDS: [FacetKind; 2] = [FacetKind::SpellsActive, FacetKind::Ai];

#[derive(Debug)]
pub struct ActorOutbox {
    partition: PartitionId,
    entries: FxHashMap<FacetKind, Vec<ActorEntry>>,
}

impl ActorOutbox {
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            entries: FxHashMap::default(),
        }
    }

    pub fn partition(&self) -> &PartitionId {
        &self.partition
    }

    pub fn push(&mut self, identity: ActorIdentity, facet: Facet) {
        self.entries
            .entry(facet.kind())
            .or_default()
            .push(ActorEntry { identity, facet });
    }

    pub fn count(&self, kind: FacetKind) -> usize {
        self.entries.get(&kind).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Turn the buffer into batches in flush order, skipping empty kinds
    pub fn into_batches(mut self) -> Vec<ActorBatch> {
        FacetKind::CAPTURE_ORDER
            .iter()
            .chain(NON_CAPTURE_KINDS.iter())
            .filter_map(|kind| {
                let entries = self.entries.remove(kind)?;
                if entries.is_empty() {
                    return None;
                }
                Some(ActorBatch {
                    kind: *kind,
                    partition: self.partition.clone(),
                    entries,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::facets::{DeathFacet, PositionFacet};

    #[test]
    fn test_batches_follow_flush_order() {
        let cell = PartitionId::exterior(0, 0);
        let mut outbox = ActorOutbox::new(cell.clone());
        let id = ActorIdentity::new(1, 0, "guar");

        outbox.push(id.clone(), Facet::Death(DeathFacet::default()));
        outbox.push(id.clone(), Facet::Speech("grunt".into()));
        outbox.push(id.clone(), Facet::Position(PositionFacet::default()));
        outbox.push(ActorIdentity::new(2, 0, "guar"), Facet::Position(PositionFacet::default()));

        assert_eq!(outbox.total(), 4);
        assert_eq!(outbox.count(FacetKind::Position), 2);

        let batches = outbox.into_batches();
        let kinds: Vec<_> = batches.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![FacetKind::Position, FacetKind::Speech, FacetKind::Death]);
        assert!(batches.iter().all(|b| b.partition == cell));
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_empty_outbox_has_no_batches() {
        let outbox = ActorOutbox::new(PartitionId::exterior(0, 0));
        assert!(outbox.is_empty());
        assert!(outbox.into_batches().is_empty());
    }
}
