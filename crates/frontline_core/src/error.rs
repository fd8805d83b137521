//! Error types for the game simulation.
//!
//! Two families live here:
//! - [`GameError`] for failures outside the tick loop (data files, snapshots,
//!   configuration). The caller usually cannot continue the operation.
//! - [`CommandError`] for rejected player/AI orders. These are recoverable
//!   reason codes: the simulation refuses the order and keeps ticking.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Result type alias for order handling.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Top-level error type for simulation setup and persistence.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A configuration value is out of its allowed range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid game state (snapshot encode/decode, broken invariants).
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected between two replicas.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },
}

/// Why a building could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementIssue {
    /// The centre tile is not owned by the placing faction.
    NotOwnedTerritory,
    /// The footprint leaves the map.
    OutOfBounds,
    /// The footprint overlaps another structure.
    OverlapsStructure,
    /// The footprint overlaps a resource site.
    OverlapsResourceSite,
}

impl std::fmt::Display for PlacementIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOwnedTerritory => write!(f, "tile is not owned territory"),
            Self::OutOfBounds => write!(f, "footprint leaves the map"),
            Self::OverlapsStructure => write!(f, "overlaps another structure"),
            Self::OverlapsResourceSite => write!(f, "overlaps a resource site"),
        }
    }
}

/// Reason an order was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The faction's ledger cannot cover the cost.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The building cannot be placed there.
    #[error("Invalid placement: {0}")]
    InvalidPlacement(PlacementIssue),

    /// The building cannot produce this unit type.
    #[error("Unit type is not producible here")]
    NotProducible,

    /// The building type cannot be constructed by players.
    #[error("Building type cannot be constructed")]
    NotBuildable,

    /// Attack target is dead, unknown, or friendly.
    #[error("Invalid attack target")]
    TargetInvalid,

    /// The production queue is at capacity.
    #[error("Production queue is full")]
    QueueFull,

    /// No such living entity.
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// The entity belongs to another faction.
    #[error("Entity is not owned by the issuing faction")]
    NotOwner,

    /// None of the given units could take the order.
    #[error("No valid units in order")]
    NoValidUnits,

    /// Already at the maximum upgrade level.
    #[error("Maximum level reached")]
    MaxLevel,

    /// A trade or transfer amount was zero or negative.
    #[error("Amount must be positive")]
    InvalidAmount,

    /// The production queue has no item at that index.
    #[error("No queued item at index {0}")]
    NoSuchQueueItem(usize),

    /// This structure cannot be sold.
    #[error("Structure cannot be sold")]
    NotSellable,
}

impl CommandError {
    /// Stable snake_case reason code for UIs and the wire protocol.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidPlacement(_) => "invalid_placement",
            Self::NotProducible => "not_producible",
            Self::NotBuildable => "not_buildable",
            Self::TargetInvalid => "target_invalid",
            Self::QueueFull => "queue_full",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::NotOwner => "not_owner",
            Self::NoValidUnits => "no_valid_units",
            Self::MaxLevel => "max_level",
            Self::InvalidAmount => "invalid_amount",
            Self::NoSuchQueueItem(_) => "no_such_queue_item",
            Self::NotSellable => "not_sellable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        assert_eq!(
            CommandError::InvalidPlacement(PlacementIssue::OverlapsStructure).to_string(),
            "Invalid placement: overlaps another structure"
        );
        assert_eq!(CommandError::UnknownEntity(7).to_string(), "Unknown entity: 7");
    }

    #[test]
    fn test_command_error_codes_are_stable() {
        assert_eq!(CommandError::InsufficientFunds.code(), "insufficient_funds");
        assert_eq!(CommandError::NotProducible.code(), "not_producible");
        assert_eq!(CommandError::TargetInvalid.code(), "target_invalid");
        assert_eq!(
            CommandError::InvalidPlacement(PlacementIssue::OutOfBounds).code(),
            "invalid_placement"
        );
    }

    #[test]
    fn test_game_error_display() {
        let err = GameError::DesyncDetected {
            tick: 10,
            local_hash: 1,
            remote_hash: 2,
        };
        assert_eq!(
            err.to_string(),
            "Desync detected at tick 10: local hash 1, remote hash 2"
        );
    }
}
