use serde::{Deserialize, Serialize};

use crate::actor::facets::{
    AiDirective, AnimFlagsFacet, AnimationPlay, Attack, Cast, CellChangeFacet, DeathFacet,
    Equipment, PositionFacet, SpellsActiveChanges, StatsDynamic,
};
use crate::actor::identity::ActorIdentity;
use crate::partition::id::PartitionId;

/// Category of actor state carried by a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacetKind {
    Position,
    AnimFlags,
    AnimPlay,
    Speech,
    Death,
    StatsDynamic,
    Equipment,
    Attack,
    Cast,
    CellChange,
    SpellsActive,
    Ai,
}

impl FacetKind {
    /// Kinds produced by local capture, in the order they are flushed
    pub const CAPTURE_ORDER: [FacetKind; 10] = [
        FacetKind::Position,
        FacetKind::AnimFlags,
        FacetKind::AnimPlay,
        FacetKind::Speech,
        FacetKind::Death,
        FacetKind::StatsDynamic,
        FacetKind::Equipment,
        FacetKind::Attack,
        FacetKind::Cast,
        FacetKind::CellChange,
    ];

    /// Whether an inbound batch of this kind may create remote records for
    /// identities not yet tracked in the partition
    pub fn instantiates_remote(self) -> bool {
        !matches!(
            self,
            FacetKind::AnimFlags | FacetKind::AnimPlay | FacetKind::Attack | FacetKind::Cast
        )
    }
}

/// One facet's payload for one actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Facet {
    Position(PositionFacet),
    AnimFlags(AnimFlagsFacet),
    AnimPlay(AnimationPlay),
    Speech(String),
    Death(DeathFacet),
    StatsDynamic(StatsDynamic),
    Equipment(Box<Equipment>),
    Attack(Attack),
    Cast(Cast),
    CellChange(CellChangeFacet),
    SpellsActive(SpellsActiveChanges),
    Ai(AiDirective),
}

impl Facet {
    pub fn kind(&self) -> FacetKind {
        match self {
            Facet::Position(_) => FacetKind::Position,
            Facet::AnimFlags(_) => FacetKind::AnimFlags,
            Facet::AnimPlay(_) => FacetKind::AnimPlay,
            Facet::Speech(_) => FacetKind::Speech,
            Facet::Death(_) => FacetKind::Death,
            Facet::StatsDynamic(_) => FacetKind::StatsDynamic,
            Facet::Equipment(_) => FacetKind::Equipment,
            Facet::Attack(_) => FacetKind::Attack,
            Facet::Cast(_) => FacetKind::Cast,
            Facet::CellChange(_) => FacetKind::CellChange,
            Facet::SpellsActive(_) => FacetKind::SpellsActive,
            Facet::Ai(_) => FacetKind::Ai,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorEntry {
    pub identity: ActorIdentity,
    pub facet: Facet,
}

/// Per-actor facet updates for a single partition and a single facet kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorBatch {
    pub kind: FacetKind,
    /// Partition the actors were in when the batch was built
    pub partition: PartitionId,
    pub entries: Vec<ActorEntry>,
}

impl ActorBatch {
    pub fn new(kind: FacetKind, partition: PartitionId) -> Self {
        Self {
            kind,
            partition,
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, identity: ActorIdentity, facet: Facet) -> Self {
        self.push(identity, facet);
        self
    }

    pub fn push(&mut self, identity: ActorIdentity, facet: Facet) {
        self.entries.push(ActorEntry { identity, facet });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Encode a batch using bincode
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a batch using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::standard())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::facets::{empty_equipment, EquipmentItem, SpellsAction, ActiveSpell};
    use crate::util::vec3::Vec3;

    #[test]
    fn test_facet_kind_matches_variant() {
        assert_eq!(Facet::Speech("hello".into()).kind(), FacetKind::Speech);
        assert_eq!(
            Facet::Equipment(Box::new(empty_equipment())).kind(),
            FacetKind::Equipment
        );
        assert_eq!(Facet::Ai(AiDirective::default()).kind(), FacetKind::Ai);
    }

    #[test]
    fn test_instantiating_kinds() {
        assert!(FacetKind::Position.instantiates_remote());
        assert!(FacetKind::CellChange.instantiates_remote());
        assert!(FacetKind::SpellsActive.instantiates_remote());
        assert!(!FacetKind::AnimFlags.instantiates_remote());
        assert!(!FacetKind::Attack.instantiates_remote());
    }

    #[test]
    fn test_capture_order_has_no_duplicates() {
        let mut kinds = FacetKind::CAPTURE_ORDER.to_vec();
        kinds.sort_by_key(|k| *k as u8);
        kinds.dedup();
        assert_eq!(kinds.len(), FacetKind::CAPTURE_ORDER.len());
    }

    #[test]
    fn test_batch_encode_decode() {
        let mut equipment = empty_equipment();
        equipment[0] = EquipmentItem::new("steel_helm", 1);

        let batch = ActorBatch::new(FacetKind::Equipment, PartitionId::interior("Caldera Mine"))
            .with_entry(ActorIdentity::new(5, 0, "miner"), Facet::Equipment(Box::new(equipment)));

        let encoded = encode(&batch).unwrap();
        let decoded: ActorBatch = decode(&encoded).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_cell_change_and_spells_encode_decode() {
        let cell_change = ActorBatch::new(FacetKind::CellChange, PartitionId::exterior(0, 0))
            .with_entry(
                ActorIdentity::new(1, 9, "netch"),
                Facet::CellChange(CellChangeFacet {
                    destination: PartitionId::exterior(1, 0),
                    position: PositionFacet::new(Vec3::new(8192.0, 10.0, 0.0), Vec3::ZERO),
                }),
            );
        let decoded: ActorBatch = decode(&encode(&cell_change).unwrap()).unwrap();
        assert_eq!(decoded, cell_change);

        let spells = ActorBatch::new(FacetKind::SpellsActive, PartitionId::exterior(0, 0))
            .with_entry(
                ActorIdentity::new(1, 9, "netch"),
                Facet::SpellsActive(SpellsActiveChanges {
                    action: SpellsAction::Add,
                    spells: vec![ActiveSpell::new("shock", "Shock")],
                }),
            );
        let decoded: ActorBatch = decode(&encode(&spells).unwrap()).unwrap();
        assert_eq!(decoded, spells);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<ActorBatch, _> = decode(&[0xff, 0xff, 0xff]);
        assert!(result.is_err());
    }
}
