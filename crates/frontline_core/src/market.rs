//! Resource exchange shared by every faction.
//!
//! Trades record supply (sales) and demand (purchases). Every
//! `update_interval` seconds each price moves toward the side with more
//! activity and is clamped to a band around its base price.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MarketConfig;
use crate::economy::{Ledger, ResourceKind};
use crate::error::{CommandError, CommandResult};
use crate::math::{fixed_serde, Fixed};
use crate::simulation::TickContext;

/// One recorded price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PricePoint(#[serde(with = "fixed_serde")] pub Fixed);

/// Live state of one resource on the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Current price per unit.
    #[serde(with = "fixed_serde")]
    pub price: Fixed,
    /// Opening price; the clamp band is relative to it.
    #[serde(with = "fixed_serde")]
    pub base_price: Fixed,
    /// Price move at the last update.
    #[serde(with = "fixed_serde")]
    pub change: Fixed,
    /// Units traded since the match began.
    #[serde(with = "fixed_serde")]
    pub volume: Fixed,
    /// Highest price seen.
    #[serde(with = "fixed_serde")]
    pub high: Fixed,
    /// Lowest price seen.
    #[serde(with = "fixed_serde")]
    pub low: Fixed,
    /// Units sold since the last update.
    #[serde(with = "fixed_serde")]
    pub supply: Fixed,
    /// Units bought since the last update.
    #[serde(with = "fixed_serde")]
    pub demand: Fixed,
    /// Recent prices, oldest first.
    pub history: VecDeque<PricePoint>,
}

impl MarketQuote {
    fn opening(base_price: Fixed) -> Self {
        Self {
            price: base_price,
            base_price,
            change: Fixed::ZERO,
            volume: Fixed::ZERO,
            high: base_price,
            low: base_price,
            supply: Fixed::ZERO,
            demand: Fixed::ZERO,
            history: VecDeque::from([PricePoint(base_price)]),
        }
    }

    /// Move the price from the activity since the last update.
    fn reprice(&mut self, config: &MarketConfig) {
        let activity = self.supply.saturating_add(self.demand).saturating_add(Fixed::ONE);
        let pressure = (self.demand - self.supply) / activity;
        let change = pressure * config.sensitivity * self.price;

        let floor = self.base_price * config.min_price_factor;
        let ceiling = self.base_price * config.max_price_factor;
        let old = self.price;
        self.price = (self.price + change).clamp(floor, ceiling);
        self.change = self.price - old;
        self.high = self.high.max(self.price);
        self.low = self.low.min(self.price);

        self.history.push_back(PricePoint(self.price));
        while self.history.len() > config.history_len.max(1) {
            self.history.pop_front();
        }
        self.supply = Fixed::ZERO;
        self.demand = Fixed::ZERO;
    }
}

/// A completed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    /// Resource traded.
    pub resource: ResourceKind,
    /// Units traded.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Dollars received (sale) or paid (purchase).
    #[serde(with = "fixed_serde")]
    pub dollars: Fixed,
}

/// The exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market {
    quotes: BTreeMap<ResourceKind, MarketQuote>,
    #[serde(with = "fixed_serde")]
    since_update: Fixed,
}

impl Default for Market {
    fn default() -> Self {
        Self::new()
    }
}

impl Market {
    /// Open the exchange at base prices.
    #[must_use]
    pub fn new() -> Self {
        Self {
            quotes: ResourceKind::ALL
                .into_iter()
                .map(|kind| (kind, MarketQuote::opening(kind.base_price())))
                .collect(),
            since_update: Fixed::ZERO,
        }
    }

    /// Quote for one resource.
    #[must_use]
    pub fn quote(&self, kind: ResourceKind) -> Option<&MarketQuote> {
        self.quotes.get(&kind)
    }

    /// Current price of one resource (base price if somehow unlisted).
    #[must_use]
    pub fn price(&self, kind: ResourceKind) -> Fixed {
        self.quote(kind).map_or_else(|| kind.base_price(), |quote| quote.price)
    }

    /// All quotes in resource order.
    pub fn quotes(&self) -> impl Iterator<Item = (ResourceKind, &MarketQuote)> {
        self.quotes.iter().map(|(kind, quote)| (*kind, quote))
    }

    fn quote_mut(&mut self, kind: ResourceKind) -> &mut MarketQuote {
        self.quotes
            .entry(kind)
            .or_insert_with(|| MarketQuote::opening(kind.base_price()))
    }

    /// Sell `amount` units from `ledger` at the current price less the fee.
    pub fn sell_resource(
        &mut self,
        config: &MarketConfig,
        ledger: &mut Ledger,
        kind: ResourceKind,
        amount: Fixed,
    ) -> CommandResult<TradeReceipt> {
        if amount <= Fixed::ZERO {
            return Err(CommandError::InvalidAmount);
        }
        if ledger.resource(kind) < amount {
            return Err(CommandError::InsufficientFunds);
        }
        let dollars = self
            .price(kind)
            .checked_mul(amount)
            .and_then(|gross| gross.checked_mul(config.sell_multiplier))
            .ok_or(CommandError::InvalidAmount)?;

        ledger.withdraw(kind, amount);
        ledger.credit_dollars(dollars);
        let quote = self.quote_mut(kind);
        quote.volume = quote.volume.saturating_add(amount);
        quote.supply = quote.supply.saturating_add(amount);
        debug!(resource = kind.id(), amount = %amount, dollars = %dollars, "Resource sold");

        Ok(TradeReceipt {
            resource: kind,
            amount,
            dollars,
        })
    }

    /// Buy `amount` units into `ledger` at the current price plus the fee.
    pub fn buy_resource(
        &mut self,
        config: &MarketConfig,
        ledger: &mut Ledger,
        kind: ResourceKind,
        amount: Fixed,
    ) -> CommandResult<TradeReceipt> {
        if amount <= Fixed::ZERO {
            return Err(CommandError::InvalidAmount);
        }
        let dollars = self
            .price(kind)
            .checked_mul(amount)
            .and_then(|gross| gross.checked_mul(config.buy_multiplier))
            .ok_or(CommandError::InvalidAmount)?;
        if ledger.dollars < dollars {
            return Err(CommandError::InsufficientFunds);
        }

        ledger.withdraw_dollars(dollars);
        ledger.credit(kind, amount);
        let quote = self.quote_mut(kind);
        quote.volume = quote.volume.saturating_add(amount);
        quote.demand = quote.demand.saturating_add(amount);
        debug!(resource = kind.id(), amount = %amount, dollars = %dollars, "Resource bought");

        Ok(TradeReceipt {
            resource: kind,
            amount,
            dollars,
        })
    }

    /// Reprice every resource now.
    pub fn update_prices(&mut self, config: &MarketConfig) {
        for quote in self.quotes.values_mut() {
            quote.reprice(config);
        }
    }
}

/// Advance the market clock, repricing when the interval elapses.
///
/// Returns whether prices moved this tick.
pub fn market_system(ctx: &TickContext<'_>, market: &mut Market) -> bool {
    let config = &ctx.config.market;
    market.since_update += ctx.dt;
    if market.since_update < config.update_interval {
        return false;
    }
    market.since_update = Fixed::ZERO;
    market.update_prices(config);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetypes::ArchetypeTable;
    use crate::config::SimConfig;
    use crate::math::ratio;

    fn funded_ledger() -> Ledger {
        let mut ledger = Ledger::new(Fixed::from_num(10_000));
        ledger.credit(ResourceKind::Oil, Fixed::from_num(50));
        ledger
    }

    #[test]
    fn test_sell_applies_fee_and_records_supply() {
        let config = MarketConfig::default();
        let mut market = Market::new();
        let mut ledger = funded_ledger();

        let receipt = market
            .sell_resource(&config, &mut ledger, ResourceKind::Oil, Fixed::from_num(10))
            .unwrap();
        // 80 * 10 * 0.995
        assert!((receipt.dollars.to_num::<f64>() - 796.0).abs() < 0.001);
        assert_eq!(ledger.resource(ResourceKind::Oil), Fixed::from_num(40));
        assert_eq!(ledger.dollars, Fixed::from_num(10_000) + receipt.dollars);

        let quote = market.quote(ResourceKind::Oil).unwrap();
        assert_eq!(quote.supply, Fixed::from_num(10));
        assert_eq!(quote.volume, Fixed::from_num(10));
    }

    #[test]
    fn test_trade_rejections() {
        let config = MarketConfig::default();
        let mut market = Market::new();
        let mut ledger = funded_ledger();

        assert_eq!(
            market.sell_resource(&config, &mut ledger, ResourceKind::Oil, Fixed::ZERO),
            Err(CommandError::InvalidAmount)
        );
        assert_eq!(
            market.sell_resource(&config, &mut ledger, ResourceKind::Gold, Fixed::ONE),
            Err(CommandError::InsufficientFunds)
        );
        // 1800 * 6 * 1.005 exceeds 10 000
        assert_eq!(
            market.buy_resource(&config, &mut ledger, ResourceKind::Gold, Fixed::from_num(6)),
            Err(CommandError::InsufficientFunds)
        );
        assert_eq!(ledger, funded_ledger());
    }

    #[test]
    fn test_buy_debits_with_fee() {
        let config = MarketConfig::default();
        let mut market = Market::new();
        let mut ledger = funded_ledger();

        let receipt = market
            .buy_resource(&config, &mut ledger, ResourceKind::Wheat, Fixed::from_num(100))
            .unwrap();
        // 8 * 100 * 1.005
        assert!((receipt.dollars.to_num::<f64>() - 804.0).abs() < 0.001);
        assert_eq!(ledger.resource(ResourceKind::Wheat), Fixed::from_num(100));
        assert_eq!(market.quote(ResourceKind::Wheat).unwrap().demand, Fixed::from_num(100));
    }

    #[test]
    fn test_demand_raises_price_and_resets_counters() {
        let config = MarketConfig::default();
        let mut market = Market::new();
        let mut ledger = funded_ledger();
        market
            .buy_resource(&config, &mut ledger, ResourceKind::Wheat, Fixed::from_num(99))
            .unwrap();

        market.update_prices(&config);
        let quote = market.quote(ResourceKind::Wheat).unwrap();
        // pressure 99/100, move 0.05 * 0.99 * 8
        assert!((quote.price.to_num::<f64>() - 8.396).abs() < 0.001);
        assert_eq!(quote.high, quote.price);
        assert_eq!(quote.demand, Fixed::ZERO);
        assert_eq!(quote.history.len(), 2);

        // No activity leaves prices unchanged
        let oil = market.price(ResourceKind::Oil);
        market.update_prices(&config);
        assert_eq!(market.price(ResourceKind::Oil), oil);
    }

    #[test]
    fn test_price_stays_within_band() {
        let config = MarketConfig::default();
        let mut market = Market::new();
        let mut ledger = Ledger::new(Fixed::ZERO);
        ledger.credit(ResourceKind::Copper, Fixed::from_num(1_000_000));

        for _ in 0..200 {
            market
                .sell_resource(&config, &mut ledger, ResourceKind::Copper, Fixed::from_num(1000))
                .unwrap();
            market.update_prices(&config);
        }
        let quote = market.quote(ResourceKind::Copper).unwrap();
        assert_eq!(quote.price, quote.base_price * config.min_price_factor);
        assert_eq!(quote.history.len(), config.history_len);
        assert!(quote.low <= quote.price);
    }

    #[test]
    fn test_market_system_waits_for_interval() {
        let config = SimConfig::default();
        let archetypes = ArchetypeTable::default();
        let mut market = Market::new();
        let ctx = TickContext {
            config: &config,
            archetypes: &archetypes,
            dt: ratio(1, 2),
            now: Fixed::ZERO,
        };

        let updates = (0..40).filter(|_| market_system(&ctx, &mut market)).count();
        assert_eq!(updates, 2);
    }
}
