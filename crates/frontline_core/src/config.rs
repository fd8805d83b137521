//! Simulation tuning.
//!
//! Every constant the systems consult lives in [`SimConfig`]. Fixed-point
//! fields are written as decimal strings in RON files; anything omitted keeps
//! its default.
//!
//! ```ron
//! SimConfig(
//!     capture_time: "4",
//!     starting_dollars: 20000,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::economy::MAX_AMOUNT;
use crate::error::{GameError, Result};
use crate::math::{fixed_str_serde, ratio, Fixed};

/// Market tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Seconds between price updates.
    #[serde(with = "fixed_str_serde")]
    pub update_interval: Fixed,
    /// Fraction of the price paid out when selling.
    #[serde(with = "fixed_str_serde")]
    pub sell_multiplier: Fixed,
    /// Fraction of the price charged when buying.
    #[serde(with = "fixed_str_serde")]
    pub buy_multiplier: Fixed,
    /// Largest relative price move per update.
    #[serde(with = "fixed_str_serde")]
    pub sensitivity: Fixed,
    /// Price floor as a multiple of the base price.
    #[serde(with = "fixed_str_serde")]
    pub min_price_factor: Fixed,
    /// Price ceiling as a multiple of the base price.
    #[serde(with = "fixed_str_serde")]
    pub max_price_factor: Fixed,
    /// Price history length per resource.
    pub history_len: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            update_interval: Fixed::from_num(10),
            sell_multiplier: ratio(995, 1000),
            buy_multiplier: ratio(1005, 1000),
            sensitivity: ratio(5, 100),
            min_price_factor: ratio(3, 10),
            max_price_factor: Fixed::from_num(5),
            history_len: 100,
        }
    }
}

/// Simulation tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Side length of one territory tile in map units.
    #[serde(with = "fixed_str_serde")]
    pub tile_size: Fixed,
    /// Largest accepted tick delta in seconds.
    #[serde(with = "fixed_str_serde")]
    pub max_dt: Fixed,

    /// Seconds for a single unit to capture a tile.
    #[serde(with = "fixed_str_serde")]
    pub capture_time: Fixed,
    /// Progress lost per second when capture stalls.
    #[serde(with = "fixed_str_serde")]
    pub capture_decay_rate: Fixed,
    /// Extra capture speed per additional unit.
    #[serde(with = "fixed_str_serde")]
    pub capture_unit_bonus: Fixed,

    /// Dollars each faction starts with.
    pub starting_dollars: u32,
    /// Seconds over which a site yields its per-minute rate.
    #[serde(with = "fixed_str_serde")]
    pub income_period: Fixed,
    /// Rate bonus per site level above 1.
    #[serde(with = "fixed_str_serde")]
    pub resource_level_bonus: Fixed,
    /// Highest resource-site level.
    pub resource_max_level: u8,
    /// Dollar cost of the first site upgrade.
    pub site_upgrade_base_cost: u32,
    /// Cost multiplier per further site upgrade.
    #[serde(with = "fixed_str_serde")]
    pub site_upgrade_cost_growth: Fixed,

    /// Production queue length per building.
    pub queue_capacity: usize,
    /// Percent of cost returned when a queued unit is cancelled.
    pub cancel_refund_percent: u32,
    /// Percent of cost returned when a building is sold.
    pub sell_refund_percent: u32,
    /// Gap between the footprint edge and the spawn ring.
    #[serde(with = "fixed_str_serde")]
    pub spawn_margin: Fixed,

    /// Target search radius as a multiple of weapon range.
    #[serde(with = "fixed_str_serde")]
    pub search_range_multiplier: Fixed,
    /// Distance at which a move order counts as arrived.
    #[serde(with = "fixed_str_serde")]
    pub arrival_threshold: Fixed,
    /// Gap between units in a move formation.
    #[serde(with = "fixed_str_serde")]
    pub formation_spacing: Fixed,
    /// Cap on live cosmetic projectiles.
    pub max_projectiles: usize,

    /// Exchange tuning.
    pub market: MarketConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tile_size: Fixed::from_num(40),
            max_dt: ratio(1, 10),
            capture_time: Fixed::from_num(5),
            capture_decay_rate: ratio(3, 10),
            capture_unit_bonus: ratio(3, 10),
            starting_dollars: 10_000,
            income_period: Fixed::from_num(60),
            resource_level_bonus: ratio(1, 5),
            resource_max_level: 10,
            site_upgrade_base_cost: 500,
            site_upgrade_cost_growth: ratio(3, 2),
            queue_capacity: 5,
            cancel_refund_percent: 75,
            sell_refund_percent: 50,
            spawn_margin: ratio(4, 5),
            search_range_multiplier: ratio(6, 5),
            arrival_threshold: ratio(1, 4),
            formation_spacing: ratio(4, 5),
            max_projectiles: 200,
            market: MarketConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse from RON text and validate.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a RON file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = ron::from_str(&text).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the systems cannot work with.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: Fixed) -> Result<()> {
            if value <= Fixed::ZERO {
                return Err(GameError::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
            Ok(())
        }
        fn non_negative(name: &str, value: Fixed) -> Result<()> {
            if value < Fixed::ZERO {
                return Err(GameError::InvalidConfig(format!("{name} must not be negative, got {value}")));
            }
            Ok(())
        }

        positive("tile_size", self.tile_size)?;
        positive("max_dt", self.max_dt)?;
        positive("capture_time", self.capture_time)?;
        positive("income_period", self.income_period)?;
        positive("arrival_threshold", self.arrival_threshold)?;
        positive("search_range_multiplier", self.search_range_multiplier)?;
        positive("market.update_interval", self.market.update_interval)?;
        positive("market.min_price_factor", self.market.min_price_factor)?;
        non_negative("capture_decay_rate", self.capture_decay_rate)?;
        non_negative("capture_unit_bonus", self.capture_unit_bonus)?;
        non_negative("resource_level_bonus", self.resource_level_bonus)?;
        non_negative("spawn_margin", self.spawn_margin)?;
        non_negative("formation_spacing", self.formation_spacing)?;
        non_negative("site_upgrade_cost_growth", self.site_upgrade_cost_growth)?;

        for (name, value) in [
            ("starting_dollars", self.starting_dollars),
            ("site_upgrade_base_cost", self.site_upgrade_base_cost),
        ] {
            if value > MAX_AMOUNT {
                return Err(GameError::InvalidConfig(format!(
                    "{name} must be at most {MAX_AMOUNT}, got {value}"
                )));
            }
        }

        if self.queue_capacity == 0 {
            return Err(GameError::InvalidConfig("queue_capacity must be at least 1".to_string()));
        }
        if self.resource_max_level == 0 {
            return Err(GameError::InvalidConfig(
                "resource_max_level must be at least 1".to_string(),
            ));
        }
        if self.cancel_refund_percent > 100 || self.sell_refund_percent > 100 {
            return Err(GameError::InvalidConfig("refund percentages must be 0..=100".to_string()));
        }
        if self.market.max_price_factor < self.market.min_price_factor {
            return Err(GameError::InvalidConfig(
                "market.max_price_factor must not be below min_price_factor".to_string(),
            ));
        }
        Ok(())
    }
}
