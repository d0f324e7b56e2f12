//! Facet payloads: the independently-updated categories of actor state
//!
//! Each type here is what travels on the wire for one facet and what the
//! world collaborator reads or writes for it.

use serde::{Deserialize, Serialize};

use crate::actor::identity::ActorIdentity;
use crate::partition::id::{HostId, PartitionId};
use crate::util::vec3::Vec3;

/// Number of equipment slots (one per equipment category)
pub const EQUIPMENT_SLOTS: usize = 19;

/// Position change threshold (world units)
/// Below this, position is considered unchanged
pub const POSITION_EPSILON: f32 = 0.1;

/// Rotation change threshold (radians, ~0.5 degrees)
pub const ROTATION_EPSILON: f32 = 0.01;

/// Dynamic stat change threshold
pub const STAT_EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionFacet {
    pub position: Vec3,
    /// Euler rotation (radians)
    pub rotation: Vec3,
}

impl PositionFacet {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    /// Whether the difference to `other` is worth sending
    pub fn differs_from(&self, other: &PositionFacet) -> bool {
        !self.position.approx_eq(other.position, POSITION_EPSILON)
            || !self.rotation.approx_eq(other.rotation, ROTATION_EPSILON)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawState {
    #[default]
    Nothing,
    Weapon,
    Spell,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimFlagsFacet {
    pub movement_flags: u16,
    pub draw_state: DrawState,
    pub is_flying: bool,
}

/// Request to play an animation group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationPlay {
    pub group: String,
    pub mode: i32,
    pub count: i32,
    pub persist: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicStat {
    pub base: f32,
    pub current: f32,
}

impl DynamicStat {
    pub fn new(base: f32, current: f32) -> Self {
        Self { base, current }
    }

    fn differs_from(&self, other: &DynamicStat) -> bool {
        (self.base - other.base).abs() > STAT_EPSILON
            || (self.current - other.current).abs() > STAT_EPSILON
    }
}

/// Health, magicka and fatigue
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsDynamic {
    pub health: DynamicStat,
    pub magicka: DynamicStat,
    pub fatigue: DynamicStat,
    pub dead: bool,
}

impl StatsDynamic {
    pub fn differs_from(&self, other: &StatsDynamic) -> bool {
        self.dead != other.dead
            || self.health.differs_from(&other.health)
            || self.magicka.differs_from(&other.magicka)
            || self.fatigue.differs_from(&other.fatigue)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentItem {
    /// Empty when the slot holds nothing
    pub ref_id: String,
    pub count: i32,
    pub charge: i32,
    pub enchantment_charge: f32,
}

impl EquipmentItem {
    pub fn new(ref_id: impl Into<String>, count: i32) -> Self {
        Self {
            ref_id: ref_id.into(),
            count,
            charge: -1,
            enchantment_charge: -1.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ref_id.is_empty()
    }
}

pub type Equipment = [EquipmentItem; EQUIPMENT_SLOTS];

pub fn empty_equipment() -> Equipment {
    std::array::from_fn(|_| EquipmentItem::default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub effect_id: i32,
    pub magnitude: f32,
    pub duration: f32,
    pub time_left: f32,
    pub arg: i32,
}

/// A spell currently affecting an actor, keyed by `id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveSpell {
    pub id: String,
    pub display_name: String,
    pub effects: Vec<ActiveEffect>,
}

impl ActiveSpell {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellsAction {
    #[default]
    Set,
    Add,
    Remove,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellsActiveChanges {
    pub action: SpellsAction,
    pub spells: Vec<ActiveSpell>,
}

/// Who an AI directive, attack or cast is aimed at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    #[default]
    None,
    Player(HostId),
    Actor(ActorIdentity),
}

impl Target {
    pub fn is_empty(&self) -> bool {
        matches!(self, Target::None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiAction {
    #[default]
    Cancel,
    Activate,
    Combat,
    Escort,
    Follow,
    Travel,
    Wander,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiDirective {
    pub action: AiAction,
    pub target: Target,
    pub distance: u32,
    pub duration: f32,
    pub repeat: bool,
    pub coordinates: Vec3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    #[default]
    Melee,
    Ranged,
    ItemMagic,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub target: Target,
    pub kind: AttackKind,
    pub pressed: bool,
    pub success: bool,
    pub damage: f32,
    pub knockdown: bool,
    pub block: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastKind {
    #[default]
    Regular,
    Item,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub target: Target,
    pub kind: CastKind,
    pub spell_id: String,
    pub item_id: String,
    pub pressed: bool,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathFacet {
    pub death_state: i32,
    /// Skip the death animation
    pub instant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellChangeFacet {
    pub destination: PartitionId,
    pub position: PositionFacet,
}
