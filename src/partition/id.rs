use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::vec3::Vec3;

/// Network identity of a host that can hold authority over partitions
pub type HostId = Uuid;

/// Side length of an exterior cell (world units)
pub const EXTERIOR_CELL_SIZE: f32 = 8192.0;

/// World cell coordinate identifying a partition
///
/// Interior names compare case-insensitively, matching how the world
/// resolves cell names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PartitionId {
    /// Exterior grid cell
    Exterior { x: i32, y: i32 },
    /// Named interior cell
    Interior(String),
}

impl PartitionId {
    pub fn exterior(x: i32, y: i32) -> Self {
        Self::Exterior { x, y }
    }

    pub fn interior(name: impl Into<String>) -> Self {
        Self::Interior(name.into())
    }

    /// Exterior cell containing a world position
    pub fn exterior_at(position: Vec3) -> Self {
        Self::Exterior {
            x: (position.x / EXTERIOR_CELL_SIZE).floor() as i32,
            y: (position.y / EXTERIOR_CELL_SIZE).floor() as i32,
        }
    }

    pub fn is_exterior(&self) -> bool {
        matches!(self, Self::Exterior { .. })
    }
}

impl PartialEq for PartitionId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exterior { x: ax, y: ay }, Self::Exterior { x: bx, y: by }) => ax == bx && ay == by,
            (Self::Interior(a), Self::Interior(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl Eq for PartitionId {}

impl Hash for PartitionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Exterior { x, y } => {
                0u8.hash(state);
                x.hash(state);
                y.hash(state);
            }
            Self::Interior(name) => {
                1u8.hash(state);
                for byte in name.bytes() {
                    byte.to_ascii_lowercase().hash(state);
                }
            }
        }
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exterior { x, y } => write!(f, "{}, {}", x, y),
            Self::Interior(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_interior_case_insensitive() {
        let a = PartitionId::interior("Balmora, Guild of Mages");
        let b = PartitionId::interior("balmora, guild of mages");
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_exterior_vs_interior() {
        assert_ne!(PartitionId::exterior(0, 0), PartitionId::interior("0, 0"));
        assert_ne!(PartitionId::exterior(1, 0), PartitionId::exterior(0, 1));
    }

    #[test]
    fn test_exterior_at() {
        assert_eq!(PartitionId::exterior_at(Vec3::new(10.0, 10.0, 0.0)), PartitionId::exterior(0, 0));
        assert_eq!(PartitionId::exterior_at(Vec3::new(8192.0, 0.0, 0.0)), PartitionId::exterior(1, 0));
        assert_eq!(PartitionId::exterior_at(Vec3::new(-1.0, -8193.0, 0.0)), PartitionId::exterior(-1, -2));
    }

    #[test]
    fn test_display() {
        assert_eq!(PartitionId::exterior(-3, 7).to_string(), "-3, 7");
        assert_eq!(PartitionId::interior("Seyda Neen").to_string(), "Seyda Neen");
    }
}
