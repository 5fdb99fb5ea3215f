//! TradeRecord — a closed simulated trade, appended once and never mutated.

use super::position::{Direction, TradeClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "STOP LOSS")]
    StopLoss,
    /// Stop-loss breach after the stop was moved to entry.
    #[serde(rename = "BREAKEVEN STOP")]
    BreakevenStop,
    #[serde(rename = "TAKE PROFIT")]
    TakeProfit,
    #[serde(rename = "TRAILING STOP")]
    TrailingStop,
    /// Session-end liquidation.
    #[serde(rename = "FORCED EXIT")]
    ForcedExit,
}

impl ExitReason {
    pub fn label(self) -> &'static str {
        match self {
            Self::StopLoss => "STOP LOSS",
            Self::BreakevenStop => "BREAKEVEN STOP",
            Self::TakeProfit => "TAKE PROFIT",
            Self::TrailingStop => "TRAILING STOP",
            Self::ForcedExit => "FORCED EXIT",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome classification: profit iff net P&L is strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeResult {
    Profit,
    Loss,
}

impl TradeResult {
    pub fn from_net_pnl(net_pnl: f64) -> Self {
        if net_pnl > 0.0 {
            Self::Profit
        } else {
            Self::Loss
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Profit => "PROFIT",
            Self::Loss => "LOSS",
        }
    }
}

/// A closed trade.
///
/// Field order is the column order of the exported trade tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Identification ──
    pub symbol: String,
    pub direction: Direction,
    pub trade_class: TradeClass,
    pub leverage: u32,

    // ── Prices & size ──
    pub entry_price: f64,
    /// Mark price the exit was taken at.
    pub exit_price: f64,
    pub size: f64,
    /// Cash debited at entry, entry fee included.
    pub capital_used: f64,

    // ── PnL ──
    /// Price move times notional, before costs.
    pub gross_pnl: f64,
    /// Exit fee: twice the fee rate on capital used.
    pub fees: f64,
    /// Estimated funding paid over `hours_held`.
    pub funding: f64,
    /// Net P&L after fees and funding.
    pub gain: f64,
    /// Leveraged return on equity at exit, as a fraction.
    pub roe: f64,
    pub result: TradeResult,
    pub exit_reason: ExitReason,

    // ── Timing ──
    pub hours_held: f64,
    pub opened_at: DateTime<Utc>,
    /// Snapshot time of the closing tick.
    pub closed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.result == TradeResult::Profit
    }

    /// Net gain relative to the capital committed.
    pub fn return_on_capital(&self) -> f64 {
        if self.capital_used <= 0.0 {
            return 0.0;
        }
        self.gain / self.capital_used
    }
}

#[cfg(test)]
pub(crate) fn sample_record(gain: f64, exit_reason: ExitReason) -> TradeRecord {
    use chrono::TimeZone;
    TradeRecord {
        symbol: "PF_ETHUSD".into(),
        direction: Direction::Long,
        trade_class: TradeClass::Swing,
        leverage: 10,
        entry_price: 100.0,
        exit_price: 101.0,
        size: 10.0,
        capital_used: 1000.6,
        gross_pnl: gain + 1.2,
        fees: 1.2,
        funding: 0.0,
        gain,
        roe: 0.1,
        result: TradeResult::from_net_pnl(gain),
        exit_reason,
        hours_held: 0.25,
        opened_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        closed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 15, 0).unwrap(),
    }
}
