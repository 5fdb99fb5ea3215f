//! Cost model — trading fees and funding, and the resulting P&L breakdown.
//!
//! Fees are charged on committed capital: once on entry (folded into
//! `capital_used`) and twice on exit. Funding accrues per hour held on entry
//! notional. Slippage is not modeled; every fill happens at the mark price.

use super::config::RiskConfig;
use crate::domain::Position;
use serde::{Deserialize, Serialize};

/// Fee and funding rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Round-trip fee rate.
    pub trading_fee: f64,
    /// Funding rate per hour.
    pub funding_rate_per_hour: f64,
}

impl CostModel {
    pub fn new(trading_fee: f64, funding_rate_per_hour: f64) -> Self {
        Self {
            trading_fee,
            funding_rate_per_hour,
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.trading_fee, config.funding_rate_estimate)
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Cash needed to commit `committed` capital.
    ///
    /// `cost = committed * (1 + trading_fee)`
    pub fn entry_cost(&self, committed: f64) -> f64 {
        committed * (1.0 + self.trading_fee)
    }

    /// Exit fee on the capital debited at entry.
    ///
    /// `fee = trading_fee * 2 * capital_used`
    pub fn exit_fee(&self, capital_used: f64) -> f64 {
        self.trading_fee * 2.0 * capital_used
    }

    /// `funding = rate * hours_held * entry_price * size`
    pub fn funding_cost(&self, hours_held: f64, entry_price: f64, size: f64) -> f64 {
        self.funding_rate_per_hour * hours_held * entry_price * size
    }

    /// Mark `position` at `price` and break the result down.
    pub fn breakdown(&self, position: &Position, price: f64) -> PnlBreakdown {
        let pnl_pct = position.pnl_pct(price);
        let roe_pct = pnl_pct * f64::from(position.leverage);
        let gross_pnl = pnl_pct * position.entry_price * position.size;
        let fees = self.exit_fee(position.capital_used);
        let funding = self.funding_cost(position.hours_held, position.entry_price, position.size);
        PnlBreakdown {
            pnl_pct,
            roe_pct,
            gross_pnl,
            fees,
            funding,
            net_pnl: gross_pnl - fees - funding,
        }
    }
}

/// P&L of a position marked at a given price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    /// Signed price move from entry as a fraction, positive when in profit.
    pub pnl_pct: f64,
    /// `pnl_pct` times leverage.
    pub roe_pct: f64,
    pub gross_pnl: f64,
    /// Exit fee that closing now would charge.
    pub fees: f64,
    /// Funding accrued so far.
    pub funding: f64,
    /// `gross_pnl - fees - funding`
    pub net_pnl: f64,
}
