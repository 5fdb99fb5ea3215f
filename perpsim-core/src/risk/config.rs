//! Risk configuration consumed by the ledger.
//!
//! Passed in at construction and replaced wholesale via
//! [`Ledger::reload_config`](crate::ledger::Ledger::reload_config). Nothing in
//! the engine reads process-wide settings.

use crate::domain::TradeClass;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RiskConfigError {
    #[error("{field} must be in (0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be non-negative and finite, got {value}")]
    NegativeRate { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("max_open_positions must be at least 1")]
    NoPositionCapacity,
}

/// All knobs of the entry gate and exit state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    // ── Sizing ──
    /// Fraction of cash committed per swing trade.
    pub swing_capital_fraction: f64,
    /// Fraction of cash committed per scalp trade.
    pub scalp_capital_fraction: f64,
    /// Entries beyond this many open positions are rejected.
    pub max_open_positions: usize,
    /// Leverage used when a candidate does not suggest one.
    pub default_leverage: u32,

    // ── Costs ──
    /// Round-trip fee rate, charged on entry and twice on exit.
    pub trading_fee: f64,
    /// Funding rate estimate per hour held.
    pub funding_rate_estimate: f64,

    // ── Swing distances (scaled by reference_leverage / leverage) ──
    /// Stop distance at `reference_leverage`.
    pub stop_loss_pct: f64,
    /// Target distance at `reference_leverage`.
    pub take_profit_pct: f64,
    /// Leverage at which the swing distances apply unscaled.
    pub reference_leverage: f64,

    // ── Scalp distances (fixed) ──
    pub scalp_stop_loss_pct: f64,
    pub scalp_take_profit_pct: f64,

    // ── Trailing ──
    /// Distance of the trailing stop from the running extreme.
    pub trailing_offset_pct: f64,
    /// ROE at which a scalp switches to trailing.
    pub trailing_activation_roe: f64,

    // ── Clock ──
    /// Hours added to `hours_held` per evaluated tick.
    pub tick_hours: f64,
    /// Seconds after a close before the symbol may be re-entered.
    pub cooldown_secs: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            swing_capital_fraction: 0.10,
            scalp_capital_fraction: 0.05,
            max_open_positions: 20,
            default_leverage: 20,
            trading_fee: 0.0006,
            funding_rate_estimate: 0.0002,
            stop_loss_pct: 0.005,
            take_profit_pct: 0.018,
            reference_leverage: 10.0,
            scalp_stop_loss_pct: 0.004,
            scalp_take_profit_pct: 0.012,
            trailing_offset_pct: 0.003,
            trailing_activation_roe: 0.02,
            tick_hours: 1.0 / 12.0,
            cooldown_secs: 300,
        }
    }
}

impl RiskConfig {
    pub fn capital_fraction(&self, trade_class: TradeClass) -> f64 {
        match trade_class {
            TradeClass::Scalp => self.scalp_capital_fraction,
            TradeClass::Swing => self.swing_capital_fraction,
        }
    }

    pub fn validate(&self) -> Result<(), RiskConfigError> {
        for (field, value) in [
            ("swing_capital_fraction", self.swing_capital_fraction),
            ("scalp_capital_fraction", self.scalp_capital_fraction),
            ("trailing_offset_pct", self.trailing_offset_pct),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(RiskConfigError::FractionOutOfRange { field, value });
            }
        }

        for (field, value) in [
            ("trading_fee", self.trading_fee),
            ("funding_rate_estimate", self.funding_rate_estimate),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("scalp_stop_loss_pct", self.scalp_stop_loss_pct),
            ("scalp_take_profit_pct", self.scalp_take_profit_pct),
            ("trailing_activation_roe", self.trailing_activation_roe),
            ("tick_hours", self.tick_hours),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RiskConfigError::NegativeRate { field, value });
            }
        }

        if !(self.reference_leverage.is_finite() && self.reference_leverage > 0.0) {
            return Err(RiskConfigError::NotPositive {
                field: "reference_leverage",
                value: self.reference_leverage,
            });
        }
        if self.default_leverage == 0 {
            return Err(RiskConfigError::NotPositive {
                field: "default_leverage",
                value: 0.0,
            });
        }
        if self.max_open_positions == 0 {
            return Err(RiskConfigError::NoPositionCapacity);
        }
        Ok(())
    }
}
