//! Economy: resource kinds, costs, per-faction ledgers and passive income.
//!
//! Balances are fixed-point so fractional per-tick income accumulates exactly.
//! Costs are whole numbers. Every mutation of a ledger goes through
//! [`Ledger::can_afford`], [`Ledger::spend`] and the `credit` family.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::EntityId;
use crate::entities::EntityStore;
use crate::error::{CommandError, CommandResult};
use crate::factions::FactionId;
use crate::math::{fixed_serde, ratio, Fixed};
use crate::simulation::TickContext;
use crate::territory::TerritoryGrid;

// ============================================================================
// Resources
// ============================================================================

/// Tradeable resource produced by map sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Oil.
    Oil,
    /// Gold.
    Gold,
    /// Wheat.
    Wheat,
    /// Iron.
    Iron,
    /// Copper.
    Copper,
    /// Uranium.
    Uranium,
}

impl ResourceKind {
    /// All resource kinds in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Oil,
        Self::Gold,
        Self::Wheat,
        Self::Iron,
        Self::Copper,
        Self::Uranium,
    ];

    /// Snake-case identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Oil => "oil",
            Self::Gold => "gold",
            Self::Wheat => "wheat",
            Self::Iron => "iron",
            Self::Copper => "copper",
            Self::Uranium => "uranium",
        }
    }

    /// Look a kind up by its identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Opening market price in dollars per unit.
    #[must_use]
    pub fn base_price(self) -> Fixed {
        Fixed::from_num(match self {
            Self::Oil => 80,
            Self::Gold => 1800,
            Self::Wheat => 8,
            Self::Iron => 120,
            Self::Copper => 9,
            Self::Uranium => 50,
        })
    }
}

// ============================================================================
// Costs
// ============================================================================

/// Largest whole amount a cost, starting balance or reserve may name.
///
/// Balances are `I32F32`; keeping every configured amount at or below this
/// leaves headroom for sums and upgrade multipliers.
pub const MAX_AMOUNT: u32 = 1_000_000_000;

/// Whole amount as a balance, saturating at the fixed-point maximum.
#[must_use]
pub fn amount(value: u32) -> Fixed {
    Fixed::saturating_from_num(value)
}

/// Price of a unit, building or upgrade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    /// Dollars.
    pub dollars: u32,
    /// Resource amounts, if any.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<ResourceKind, u32>,
}

impl Cost {
    /// A dollars-only cost.
    #[must_use]
    pub fn dollars(dollars: u32) -> Self {
        Self {
            dollars,
            resources: BTreeMap::new(),
        }
    }

    /// Add a resource requirement.
    #[must_use]
    pub fn with_resource(mut self, kind: ResourceKind, amount: u32) -> Self {
        self.resources.insert(kind, amount);
        self
    }

    /// Whether the cost is zero in every currency.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.dollars == 0 && self.resources.values().all(|amount| *amount == 0)
    }

    /// Largest component in any currency.
    #[must_use]
    pub fn largest_amount(&self) -> u32 {
        self.resources.values().copied().fold(self.dollars, u32::max)
    }
}

// ============================================================================
// Ledgers
// ============================================================================

/// Per-kind resource stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceBalances {
    #[serde(with = "fixed_serde")]
    oil: Fixed,
    #[serde(with = "fixed_serde")]
    gold: Fixed,
    #[serde(with = "fixed_serde")]
    wheat: Fixed,
    #[serde(with = "fixed_serde")]
    iron: Fixed,
    #[serde(with = "fixed_serde")]
    copper: Fixed,
    #[serde(with = "fixed_serde")]
    uranium: Fixed,
}

impl ResourceBalances {
    /// Balance of one kind.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> Fixed {
        match kind {
            ResourceKind::Oil => self.oil,
            ResourceKind::Gold => self.gold,
            ResourceKind::Wheat => self.wheat,
            ResourceKind::Iron => self.iron,
            ResourceKind::Copper => self.copper,
            ResourceKind::Uranium => self.uranium,
        }
    }

    /// Mutable balance of one kind.
    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut Fixed {
        match kind {
            ResourceKind::Oil => &mut self.oil,
            ResourceKind::Gold => &mut self.gold,
            ResourceKind::Wheat => &mut self.wheat,
            ResourceKind::Iron => &mut self.iron,
            ResourceKind::Copper => &mut self.copper,
            ResourceKind::Uranium => &mut self.uranium,
        }
    }

    /// Iterate `(kind, balance)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, Fixed)> + '_ {
        ResourceKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }
}

/// One faction's currency and resource balances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ledger {
    /// Dollars on hand.
    #[serde(with = "fixed_serde")]
    pub dollars: Fixed,
    /// Resource stock.
    pub stock: ResourceBalances,
}

impl Ledger {
    /// Create a ledger with starting dollars and no resources.
    #[must_use]
    pub fn new(dollars: Fixed) -> Self {
        Self {
            dollars,
            stock: ResourceBalances::default(),
        }
    }

    /// Balance of one resource.
    #[must_use]
    pub const fn resource(&self, kind: ResourceKind) -> Fixed {
        self.stock.get(kind)
    }

    /// True iff every component of `cost` is covered.
    #[must_use]
    pub fn can_afford(&self, cost: &Cost) -> bool {
        self.dollars >= amount(cost.dollars)
            && cost
                .resources
                .iter()
                .all(|(kind, required)| self.stock.get(*kind) >= amount(*required))
    }

    /// Debit `cost` unconditionally.
    ///
    /// Callers check [`Ledger::can_afford`] first; a negative balance left
    /// behind is reported by `Simulation::validate_invariants`.
    pub fn spend(&mut self, cost: &Cost) {
        self.dollars = self.dollars.saturating_sub(amount(cost.dollars));
        for (kind, required) in &cost.resources {
            let stock = self.stock.get_mut(*kind);
            *stock = stock.saturating_sub(amount(*required));
        }
    }

    /// Add resource stock.
    pub fn credit(&mut self, kind: ResourceKind, amount: Fixed) {
        *self.stock.get_mut(kind) += amount;
    }

    /// Add dollars.
    pub fn credit_dollars(&mut self, amount: Fixed) {
        self.dollars += amount;
    }

    /// Remove resource stock. Callers check the balance first.
    pub(crate) fn withdraw(&mut self, kind: ResourceKind, amount: Fixed) {
        *self.stock.get_mut(kind) -= amount;
    }

    /// Remove dollars. Callers check the balance first.
    pub(crate) fn withdraw_dollars(&mut self, amount: Fixed) {
        self.dollars -= amount;
    }

    /// Return `percent`% of `cost` to the ledger.
    pub fn refund(&mut self, cost: &Cost, percent: u32) {
        let share = ratio(percent as i32, 100);
        self.credit_dollars(amount(cost.dollars) * share);
        for (kind, returned) in &cost.resources {
            self.credit(*kind, amount(*returned) * share);
        }
    }

    /// Whether any balance is negative.
    #[must_use]
    pub fn is_overdrawn(&self) -> bool {
        self.dollars < Fixed::ZERO || self.stock.iter().any(|(_, amount)| amount < Fixed::ZERO)
    }
}

/// All faction ledgers, keyed by faction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ledgers(BTreeMap<FactionId, Ledger>);

impl Ledgers {
    /// Create an empty set of ledgers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a ledger for `faction` with starting dollars (replacing any existing one).
    pub fn open(&mut self, faction: FactionId, dollars: Fixed) {
        self.0.insert(faction, Ledger::new(dollars));
    }

    /// Ledger of `faction`.
    #[must_use]
    pub fn get(&self, faction: FactionId) -> Option<&Ledger> {
        self.0.get(&faction)
    }

    /// Mutable ledger of `faction`.
    pub fn get_mut(&mut self, faction: FactionId) -> Option<&mut Ledger> {
        self.0.get_mut(&faction)
    }

    /// Iterate in faction order.
    pub fn iter(&self) -> impl Iterator<Item = (FactionId, &Ledger)> {
        self.0.iter().map(|(faction, ledger)| (*faction, ledger))
    }

    /// Whether `faction` can afford `cost`. Unknown factions afford nothing.
    #[must_use]
    pub fn can_afford(&self, faction: FactionId, cost: &Cost) -> bool {
        self.get(faction).is_some_and(|ledger| ledger.can_afford(cost))
    }

    /// Check and debit in one step.
    pub fn try_spend(&mut self, faction: FactionId, cost: &Cost) -> CommandResult<()> {
        let ledger = self.get_mut(faction).ok_or(CommandError::InsufficientFunds)?;
        if !ledger.can_afford(cost) {
            return Err(CommandError::InsufficientFunds);
        }
        ledger.spend(cost);
        Ok(())
    }
}

// ============================================================================
// Systems
// ============================================================================

/// Credit every faction with income from the resource sites it owns.
///
/// A site produces `base_rate * level_multiplier` per `income_period` seconds;
/// ownership is read from the grid.
pub fn passive_income_system(
    ctx: &TickContext<'_>,
    grid: &TerritoryGrid,
    store: &EntityStore,
    ledgers: &mut Ledgers,
) {
    if ctx.dt <= Fixed::ZERO {
        return;
    }
    let period = ctx.config.income_period;
    for site in store.resource_sites() {
        let Some(owner) = grid.owner_of(site.tile) else {
            continue;
        };
        let Some(ledger) = ledgers.get_mut(owner) else {
            continue;
        };
        let income = site.rate_per_minute(ctx.config.resource_level_bonus) / period * ctx.dt;
        ledger.credit(site.resource, income);
    }
}

/// Dollar cost of raising a site from `level` to `level + 1`.
///
/// `floor(base * growth^(level - 1))`.
#[must_use]
pub fn site_upgrade_cost(base: u32, growth: Fixed, level: u8) -> u32 {
    let mut cost = amount(base);
    for _ in 1..level {
        cost = cost.saturating_mul(growth);
    }
    cost.floor().saturating_to_num::<u32>()
}

/// Upgrade a resource site owned (via its tile) by `faction`.
///
/// Returns the new level.
pub fn upgrade_resource_site(
    ctx: &TickContext<'_>,
    grid: &TerritoryGrid,
    store: &mut EntityStore,
    ledgers: &mut Ledgers,
    site_id: EntityId,
    faction: FactionId,
) -> CommandResult<u8> {
    let site = store
        .resource_site_mut(site_id)
        .ok_or(CommandError::UnknownEntity(site_id))?;
    if grid.owner_of(site.tile) != Some(faction) {
        return Err(CommandError::NotOwner);
    }
    if site.level >= ctx.config.resource_max_level {
        return Err(CommandError::MaxLevel);
    }
    let cost = Cost::dollars(site_upgrade_cost(
        ctx.config.site_upgrade_base_cost,
        ctx.config.site_upgrade_cost_growth,
        site.level,
    ));
    ledgers.try_spend(faction, &cost)?;
    site.level += 1;
    debug!(site = site_id, level = site.level, %faction, "Resource site upgraded");
    Ok(site.level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_afford_checks_every_currency() {
        let mut ledger = Ledger::new(Fixed::from_num(500));
        ledger.credit(ResourceKind::Iron, Fixed::from_num(10));

        assert!(ledger.can_afford(&Cost::dollars(500)));
        assert!(!ledger.can_afford(&Cost::dollars(501)));
        assert!(ledger.can_afford(&Cost::dollars(100).with_resource(ResourceKind::Iron, 10)));
        assert!(!ledger.can_afford(&Cost::dollars(100).with_resource(ResourceKind::Iron, 11)));
        assert!(!ledger.can_afford(&Cost::dollars(0).with_resource(ResourceKind::Oil, 1)));
    }

    #[test]
    fn test_spend_then_can_afford() {
        let mut ledger = Ledger::new(Fixed::from_num(300));
        let cost = Cost::dollars(200);
        assert!(ledger.can_afford(&cost));
        ledger.spend(&cost);
        assert_eq!(ledger.dollars, Fixed::from_num(100));
        assert!(!ledger.can_afford(&cost));
    }

    #[test]
    fn test_spend_without_check_overdraws() {
        let mut ledger = Ledger::new(Fixed::from_num(50));
        ledger.spend(&Cost::dollars(100));
        assert!(ledger.is_overdrawn());
    }

    #[test]
    fn test_refund_percentage() {
        let mut ledger = Ledger::new(Fixed::ZERO);
        ledger.refund(&Cost::dollars(400).with_resource(ResourceKind::Gold, 4), 75);
        assert_eq!(ledger.dollars, Fixed::from_num(300));
        assert_eq!(ledger.resource(ResourceKind::Gold), Fixed::from_num(3));
    }

    #[test]
    fn test_try_spend_rejects_unknown_faction() {
        let mut ledgers = Ledgers::new();
        ledgers.open(FactionId(0), Fixed::from_num(100));
        assert_eq!(
            ledgers.try_spend(FactionId(1), &Cost::dollars(1)),
            Err(CommandError::InsufficientFunds)
        );
        assert!(ledgers.try_spend(FactionId(0), &Cost::dollars(100)).is_ok());
        assert_eq!(
            ledgers.try_spend(FactionId(0), &Cost::dollars(1)),
            Err(CommandError::InsufficientFunds)
        );
    }

    #[test]
    fn test_site_upgrade_cost_curve() {
        let growth = ratio(3, 2);
        assert_eq!(site_upgrade_cost(500, growth, 1), 500);
        assert_eq!(site_upgrade_cost(500, growth, 2), 750);
        assert_eq!(site_upgrade_cost(500, growth, 3), 1125);
        // 500 * 1.5^3 = 1687.5
        assert_eq!(site_upgrade_cost(500, growth, 4), 1687);
    }

    #[test]
    fn test_huge_amounts_saturate_instead_of_panicking() {
        let mut ledger = Ledger::new(Fixed::from_num(100));
        let cost = Cost::dollars(u32::MAX).with_resource(ResourceKind::Gold, u32::MAX);
        assert_eq!(cost.largest_amount(), u32::MAX);
        assert!(!ledger.can_afford(&cost));

        ledger.spend(&cost);
        assert!(ledger.is_overdrawn());
        assert_eq!(site_upgrade_cost(u32::MAX, Fixed::from_num(2), 10), amount(u32::MAX).to_num::<u32>());
    }

    #[test]
    fn test_resource_ids_roundtrip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_id(kind.id()), Some(kind));
        }
    }
}
