//! Entry sizing — capital allocation and risk distances for a new position.
//!
//! Committed capital is a fraction of current cash chosen by trade class.
//! Quantity is committed notional divided by the mark price; leverage shapes
//! the risk distances and ROE but not the quantity.

use super::config::RiskConfig;
use super::cost::CostModel;
use crate::domain::{Direction, Position, TradeClass};
use chrono::{DateTime, Utc};

/// Stop/target/trail distances as fractions of entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskDistances {
    /// Stop distance from entry, as a fraction of price.
    pub stop_loss_pct: f64,
    /// Target distance from entry.
    pub take_profit_pct: f64,
    /// Trailing distance from the running extreme.
    pub trail_offset_pct: f64,
}

impl RiskDistances {
    /// Swing distances tighten as leverage rises so the account-level risk
    /// stays roughly constant: `base * reference_leverage / leverage`.
    /// Scalp distances ignore leverage.
    pub fn for_class(config: &RiskConfig, trade_class: TradeClass, leverage: u32) -> Self {
        let (stop_loss_pct, take_profit_pct) = match trade_class {
            TradeClass::Swing => {
                let scale = config.reference_leverage / f64::from(leverage.max(1));
                (config.stop_loss_pct * scale, config.take_profit_pct * scale)
            }
            TradeClass::Scalp => (config.scalp_stop_loss_pct, config.scalp_take_profit_pct),
        };
        Self {
            stop_loss_pct,
            take_profit_pct,
            trail_offset_pct: config.trailing_offset_pct,
        }
    }
}

/// A sized, affordable entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPlan {
    pub price: f64,
    pub leverage: u32,
    pub trade_class: TradeClass,
    /// Capital committed before fees.
    pub committed: f64,
    /// Cash to debit: committed plus entry fee.
    pub cost: f64,
    /// Units bought: committed / price.
    pub size: f64,
    pub distances: RiskDistances,
}

impl EntryPlan {
    /// Size an entry against `cash`. Returns `None` when the entry cannot be
    /// paid for or the inputs cannot produce a position.
    pub fn size(
        config: &RiskConfig,
        cash: f64,
        price: f64,
        leverage: u32,
        trade_class: TradeClass,
    ) -> Option<Self> {
        if !(price.is_finite() && price > 0.0) || leverage == 0 {
            return None;
        }
        let committed = cash * config.capital_fraction(trade_class);
        if committed <= 0.0 {
            return None;
        }
        let cost = CostModel::from_config(config).entry_cost(committed);
        if cash < cost {
            return None;
        }
        Some(Self {
            price,
            leverage,
            trade_class,
            committed,
            cost,
            size: committed / price,
            distances: RiskDistances::for_class(config, trade_class, leverage),
        })
    }

    /// Materialize the plan as a fresh position.
    pub fn open(
        &self,
        symbol: impl Into<String>,
        direction: Direction,
        opened_at: DateTime<Utc>,
    ) -> Position {
        Position {
            symbol: symbol.into(),
            direction,
            trade_class: self.trade_class,
            entry_price: self.price,
            size: self.size,
            leverage: self.leverage,
            capital_used: self.cost,
            opened_at,
            hours_held: 0.0,
            max_price: self.price,
            min_price: self.price,
            stop_loss_pct: self.distances.stop_loss_pct,
            take_profit_pct: Some(self.distances.take_profit_pct),
            trail_offset_pct: self.distances.trail_offset_pct,
            breakeven_set: false,
            trailing_active: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn swing_at_reference_leverage_uses_base_distances() {
        let c = RiskConfig::default();
        let d = RiskDistances::for_class(&c, TradeClass::Swing, 10);
        assert!((d.stop_loss_pct - 0.005).abs() < 1e-12);
        assert!((d.take_profit_pct - 0.018).abs() < 1e-12);
        assert_eq!(d.trail_offset_pct, 0.003);
    }

    #[test]
    fn swing_distances_tighten_with_leverage() {
        let c = RiskConfig::default();
        let d = RiskDistances::for_class(&c, TradeClass::Swing, 20);
        assert!((d.stop_loss_pct - 0.0025).abs() < 1e-12);
        assert!((d.take_profit_pct - 0.009).abs() < 1e-12);
    }

    #[test]
    fn scalp_distances_ignore_leverage() {
        let c = RiskConfig::default();
        let a = RiskDistances::for_class(&c, TradeClass::Scalp, 5);
        let b = RiskDistances::for_class(&c, TradeClass::Scalp, 50);
        assert_eq!(a, b);
        assert_eq!(a.stop_loss_pct, c.scalp_stop_loss_pct);
    }

    #[test]
    fn sizes_from_cash_fraction() {
        let c = RiskConfig::default();
        let plan = EntryPlan::size(&c, 10_000.0, 100.0, 10, TradeClass::Swing).unwrap();
        assert!((plan.committed - 1000.0).abs() < 1e-9);
        assert!((plan.cost - 1000.6).abs() < 1e-9);
        assert!((plan.size - 10.0).abs() < 1e-12);

        let scalp = EntryPlan::size(&c, 10_000.0, 100.0, 20, TradeClass::Scalp).unwrap();
        assert!((scalp.committed - 500.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_when_fee_makes_it_unaffordable() {
        let c = RiskConfig {
            swing_capital_fraction: 1.0,
            ..RiskConfig::default()
        };
        assert!(EntryPlan::size(&c, 1000.0, 100.0, 10, TradeClass::Swing).is_none());
    }

    #[test]
    fn rejects_bad_price_and_empty_cash() {
        let c = RiskConfig::default();
        assert!(EntryPlan::size(&c, 1000.0, 0.0, 10, TradeClass::Swing).is_none());
        assert!(EntryPlan::size(&c, 1000.0, f64::NAN, 10, TradeClass::Swing).is_none());
        assert!(EntryPlan::size(&c, 0.0, 100.0, 10, TradeClass::Swing).is_none());
    }

    #[test]
    fn open_seeds_extrema_and_flags() {
        let c = RiskConfig::default();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let pos = EntryPlan::size(&c, 10_000.0, 250.0, 10, TradeClass::Scalp)
            .unwrap()
            .open("PF_SOLUSD", Direction::Short, at);
        assert_eq!(pos.max_price, 250.0);
        assert_eq!(pos.min_price, 250.0);
        assert!(!pos.breakeven_set && !pos.trailing_active);
        assert_eq!(pos.take_profit_pct, Some(c.scalp_take_profit_pct));
        assert_eq!(pos.opened_at, at);
        assert_eq!(pos.hours_held, 0.0);
    }
}
