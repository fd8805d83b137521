//! # Frontline Core
//!
//! Deterministic simulation core for a territory-control RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO outside explicit data-file loaders
//! - No system randomness (one seeded RNG lives in the world)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless batch runs
//! - Save/restore through snapshots
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`archetypes`] - Unit and building capability tables
//! - [`components`] - Unit, building and resource site records
//! - [`entities`] - Entity storage and id allocation
//! - [`territory`] - Tile grid and ownership
//! - [`capture`] - Tile capture by unit presence
//! - [`economy`] - Ledgers and passive income
//! - [`market`] - Resource exchange
//! - [`production`] - Queues, placement, selling and upgrades
//! - [`combat`] - Targeting, attacks, projectiles and healing
//! - [`map_generation`] - Seeded maps
//! - [`simulation`] - Tick loop, orders and snapshots
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod archetypes;
pub mod capture;
pub mod combat;
pub mod components;
pub mod config;
pub mod economy;
pub mod entities;
pub mod error;
pub mod factions;
pub mod map_generation;
pub mod market;
pub mod math;
pub mod production;
pub mod simulation;
pub mod territory;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::archetypes::{ArchetypeTable, BuildingKind, UnitKind};
    pub use crate::capture::CaptureEvent;
    pub use crate::combat::{DamageEvent, HealEvent, Projectile};
    pub use crate::components::{Building, CombatState, EntityId, Health, ResourceSite, Unit};
    pub use crate::config::{MarketConfig, SimConfig};
    pub use crate::economy::{Cost, Ledger, Ledgers, ResourceKind};
    pub use crate::entities::{EntityStore, RemovalReport};
    pub use crate::error::{CommandError, CommandResult, GameError, Result};
    pub use crate::factions::FactionId;
    pub use crate::map_generation::{MapConfig, MapSize};
    pub use crate::market::{Market, TradeReceipt};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::production::{ProductionEvent, ProductionQueue};
    pub use crate::simulation::{MatchOutcome, Simulation, TickContext, TickEvents, WorldSnapshot};
    pub use crate::territory::{TerritoryGrid, Tile, TileCoord};
}
