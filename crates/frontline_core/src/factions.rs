//! Faction identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a faction (player, AI, or remote participant).
///
/// Factions are symmetric: any number of them share one archetype table and
/// differ only in ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(pub u8);

impl FactionId {
    /// Create a new faction ID.
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Zero-based index, handy for per-faction arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_display() {
        assert_eq!(FactionId::new(3).to_string(), "faction-3");
        assert_eq!(FactionId::new(3).index(), 3);
    }

    #[test]
    fn test_faction_ordering_is_numeric() {
        let mut ids = vec![FactionId(2), FactionId(0), FactionId(1)];
        ids.sort();
        assert_eq!(ids, vec![FactionId(0), FactionId(1), FactionId(2)]);
    }
}
