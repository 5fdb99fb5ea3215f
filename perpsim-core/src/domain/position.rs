//! Position — one simulated open perpetual-futures trade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trade class, fixed at entry.
///
/// Scalps size smaller, use leverage-independent stop/target distances, and
/// are eligible for breakeven and trailing. Swings keep fixed distances for
/// their whole life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeClass {
    Scalp,
    #[default]
    Swing,
}

impl TradeClass {
    pub fn label(self) -> &'static str {
        match self {
            Self::Scalp => "scalp",
            Self::Swing => "swing",
        }
    }
}

impl fmt::Display for TradeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Exit regime a position is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitState {
    /// Percentage stop-loss and take-profit both armed.
    ActiveFixed,
    /// Stop moved to entry; take-profit still armed.
    Breakeven,
    /// Exit governed only by the trailing offset from the running extreme.
    Trailing,
}

/// Open position record.
///
/// Invariants:
/// - `trailing_active` implies `take_profit_pct.is_none()` and `stop_loss_pct == 0.0`.
/// - `breakeven_set` implies `stop_loss_pct == 0.0`.
/// - `max_price` never decreases and `min_price` never increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub trade_class: TradeClass,
    /// Mark price at entry.
    pub entry_price: f64,
    /// Units held: committed capital / entry price.
    pub size: f64,
    pub leverage: u32,
    /// Cash debited at entry, entry fee included.
    pub capital_used: f64,
    /// Snapshot time of the entry tick.
    pub opened_at: DateTime<Utc>,
    /// Simulated hours, advanced by `tick_hours` per evaluated tick.
    pub hours_held: f64,
    /// Highest price seen since entry, entry included.
    pub max_price: f64,
    /// Lowest price seen since entry, entry included.
    pub min_price: f64,
    /// Stop distance from entry as a fraction of price.
    pub stop_loss_pct: f64,
    /// Target distance from entry. `None` once trailing takes over.
    pub take_profit_pct: Option<f64>,
    /// Trailing distance from the running extreme.
    pub trail_offset_pct: f64,
    /// Stop has been moved to entry. Never cleared.
    pub breakeven_set: bool,
    /// Trailing stop governs the exit. Never cleared.
    pub trailing_active: bool,
}

impl Position {
    /// Price move as a fraction of entry, signed so that profit is positive.
    pub fn pnl_pct(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry_price) / self.entry_price,
            Direction::Short => (self.entry_price - price) / self.entry_price,
        }
    }

    /// Return on equity: price move times leverage.
    pub fn roe_pct(&self, price: f64) -> f64 {
        self.pnl_pct(price) * f64::from(self.leverage)
    }

    /// Fold a new mark into the running extrema.
    pub fn update_extrema(&mut self, price: f64) {
        self.max_price = self.max_price.max(price);
        self.min_price = self.min_price.min(price);
    }

    pub fn exit_state(&self) -> ExitState {
        if self.trailing_active {
            ExitState::Trailing
        } else if self.breakeven_set {
            ExitState::Breakeven
        } else {
            ExitState::ActiveFixed
        }
    }

    /// Price at which the trailing stop fires, once trailing is active.
    pub fn trailing_stop_price(&self) -> Option<f64> {
        if !self.trailing_active {
            return None;
        }
        Some(match self.direction {
            Direction::Long => self.max_price * (1.0 - self.trail_offset_pct),
            Direction::Short => self.min_price * (1.0 + self.trail_offset_pct),
        })
    }

    /// Notional at entry.
    pub fn notional(&self) -> f64 {
        self.entry_price * self.size
    }
}

#[cfg(test)]
pub(crate) fn sample_position(direction: Direction, trade_class: TradeClass) -> Position {
    use chrono::TimeZone;
    Position {
        symbol: "PF_XBTUSD".into(),
        direction,
        trade_class,
        entry_price: 100.0,
        size: 10.0,
        leverage: 10,
        capital_used: 1000.6,
        opened_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        hours_held: 0.0,
        max_price: 100.0,
        min_price: 100.0,
        stop_loss_pct: 0.005,
        take_profit_pct: Some(0.018),
        trail_offset_pct: 0.003,
        breakeven_set: false,
        trailing_active: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pnl_sign_follows_direction() {
        let long = sample_position(Direction::Long, TradeClass::Swing);
        let short = sample_position(Direction::Short, TradeClass::Swing);
        assert!((long.pnl_pct(101.0) - 0.01).abs() < 1e-12);
        assert!((short.pnl_pct(101.0) + 0.01).abs() < 1e-12);
        assert!((long.roe_pct(101.0) - 0.10).abs() < 1e-12);
    }

    #[test]
    fn extrema_only_widen() {
        let mut pos = sample_position(Direction::Long, TradeClass::Scalp);
        pos.update_extrema(103.0);
        pos.update_extrema(98.0);
        pos.update_extrema(101.0);
        assert_eq!(pos.max_price, 103.0);
        assert_eq!(pos.min_price, 98.0);
    }

    #[test]
    fn exit_state_reflects_flags() {
        let mut pos = sample_position(Direction::Short, TradeClass::Scalp);
        assert_eq!(pos.exit_state(), ExitState::ActiveFixed);
        pos.breakeven_set = true;
        assert_eq!(pos.exit_state(), ExitState::Breakeven);
        pos.trailing_active = true;
        assert_eq!(pos.exit_state(), ExitState::Trailing);
    }

    #[test]
    fn trailing_stop_price_by_direction() {
        let mut long = sample_position(Direction::Long, TradeClass::Scalp);
        assert_eq!(long.trailing_stop_price(), None);
        long.trailing_active = true;
        long.max_price = 110.0;
        assert!((long.trailing_stop_price().unwrap() - 109.67).abs() < 1e-9);

        let mut short = sample_position(Direction::Short, TradeClass::Scalp);
        short.trailing_active = true;
        short.min_price = 90.0;
        assert!((short.trailing_stop_price().unwrap() - 90.27).abs() < 1e-9);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Long).unwrap(), "\"long\"");
        assert_eq!(serde_json::to_string(&TradeClass::Scalp).unwrap(), "\"scalp\"");
        assert_eq!(TradeClass::default(), TradeClass::Swing);
    }
}
