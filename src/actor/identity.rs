use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable key for a networked actor
///
/// Composed of the world reference number, the multiplayer-assigned number
/// and the reference type id. Two identities are equal iff all three match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub ref_num: u32,
    pub mp_num: u32,
    pub ref_id: String,
}

impl ActorIdentity {
    pub fn new(ref_num: u32, mp_num: u32, ref_id: impl Into<String>) -> Self {
        Self {
            ref_num,
            mp_num,
            ref_id: ref_id.into(),
        }
    }

    /// References with neither a ref number nor an mp number can't be told apart
    #[inline]
    pub fn has_unique_index(&self) -> bool {
        self.ref_num != 0 || self.mp_num != 0
    }
}

impl fmt::Display for ActorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{}", self.ref_id, self.ref_num, self.mp_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_equality_needs_all_fields() {
        let a = ActorIdentity::new(12, 0, "mudcrab");
        assert_eq!(a, ActorIdentity::new(12, 0, "mudcrab"));
        assert_ne!(a, ActorIdentity::new(12, 1, "mudcrab"));
        assert_ne!(a, ActorIdentity::new(13, 0, "mudcrab"));
        assert_ne!(a, ActorIdentity::new(12, 0, "cliff racer"));
    }

    #[test]
    fn test_identity_no_formatting_ambiguity() {
        // "1-23" vs "12-3" collide if the key is a formatted string
        let a = ActorIdentity::new(1, 23, "guard");
        let b = ActorIdentity::new(12, 3, "guard");
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_unique_index() {
        assert!(!ActorIdentity::new(0, 0, "rat").has_unique_index());
        assert!(ActorIdentity::new(0, 5, "rat").has_unique_index());
        assert!(ActorIdentity::new(5, 0, "rat").has_unique_index());
    }

    #[test]
    fn test_display() {
        assert_eq!(ActorIdentity::new(4, 2, "ashghoul").to_string(), "ashghoul 4-2");
    }
}
