//! Values the ledger hands to its callers: entry outcomes, lifecycle events,
//! flash messages and per-tick position summaries.
//!
//! None of these feed back into ledger state. They exist for presentation,
//! logging and tests.

use crate::domain::{Direction, ExitReason, ExitState, Position, TradeClass, TradeRecord, TradeResult};
use crate::risk::TickEvaluation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a flash message stays on screen.
pub const FLASH_TIMEOUT: Duration = Duration::from_secs(3);

/// Error-taxonomy bucket of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectCategory {
    InputUnusable,
    CapacityRejected,
    InsufficientCash,
}

/// Why `execute_trade` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    AtCapacity,
    CooldownActive,
    AlreadyOpen,
    UnusablePrice,
    /// Leverage of zero.
    InvalidLeverage,
    InsufficientCash,
}

impl RejectReason {
    pub fn category(self) -> RejectCategory {
        match self {
            Self::UnusablePrice | Self::InvalidLeverage => RejectCategory::InputUnusable,
            Self::AtCapacity | Self::CooldownActive | Self::AlreadyOpen => {
                RejectCategory::CapacityRejected
            }
            Self::InsufficientCash => RejectCategory::InsufficientCash,
        }
    }
}

/// Details of an accepted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryNotice {
    pub symbol: String,
    pub direction: Direction,
    pub trade_class: TradeClass,
    pub price: f64,
    pub size: f64,
    pub leverage: u32,
    pub capital_used: f64,
    pub opened_at: DateTime<Utc>,
}

/// Result of `execute_trade`. Callers must not assume an entry happened.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Opened(EntryNotice),
    Rejected(RejectReason),
}

impl EntryOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened(_))
    }

    pub fn rejection(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(r) => Some(*r),
            Self::Opened(_) => None,
        }
    }
}

/// Position lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    Opened(EntryNotice),
    Closed(TradeRecord),
}

/// Color hint for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashTone {
    Info,
    Profit,
    Loss,
    /// Profitable take-profit exit.
    Highlight,
}

/// Transient message shown on entry/exit.
#[derive(Debug, Clone, PartialEq)]
pub struct FlashMessage {
    pub text: String,
    pub tone: FlashTone,
    pub timeout: Duration,
}

fn short_symbol(symbol: &str) -> &str {
    match symbol.char_indices().nth(10) {
        Some((idx, _)) => &symbol[..idx],
        None => symbol,
    }
}

impl LedgerEvent {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Opened(n) => &n.symbol,
            Self::Closed(r) => &r.symbol,
        }
    }

    pub fn flash(&self) -> FlashMessage {
        match self {
            Self::Opened(n) => FlashMessage {
                text: format!(
                    "Opened {} [{}] at {:.4} | Lev: {}x | {}",
                    short_symbol(&n.symbol),
                    n.direction,
                    n.price,
                    n.leverage,
                    n.trade_class
                ),
                tone: FlashTone::Info,
                timeout: FLASH_TIMEOUT,
            },
            Self::Closed(r) => {
                let tone = match (r.result, r.exit_reason) {
                    (TradeResult::Profit, ExitReason::TakeProfit) => FlashTone::Highlight,
                    (TradeResult::Profit, _) => FlashTone::Profit,
                    (TradeResult::Loss, _) => FlashTone::Loss,
                };
                FlashMessage {
                    text: format!(
                        "Closed {} [{}] at {:.4} due to {} | Result: {}",
                        short_symbol(&r.symbol),
                        r.direction,
                        r.exit_price,
                        r.exit_reason,
                        r.result.label()
                    ),
                    tone,
                    timeout: FLASH_TIMEOUT,
                }
            }
        }
    }
}

/// One open position as displayed after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub direction: Direction,
    pub trade_class: TradeClass,
    pub leverage: u32,
    pub price: f64,
    pub roe_pct: f64,
    pub pnl_pct: f64,
    pub capital_used: f64,
    pub net_pnl: f64,
    pub funding: f64,
    /// Current stop distance; 0 once at breakeven or trailing.
    pub stop_loss_pct: f64,
    /// `None` once trailing has taken over.
    pub take_profit_pct: Option<f64>,
    /// Trailing offset, only while trailing is active.
    pub trailing_pct: Option<f64>,
    pub exit_state: ExitState,
    pub hours_held: f64,
}

impl PositionSummary {
    pub fn new(position: &Position, eval: &TickEvaluation) -> Self {
        Self {
            symbol: position.symbol.clone(),
            direction: position.direction,
            trade_class: position.trade_class,
            leverage: position.leverage,
            price: eval.price,
            roe_pct: eval.pnl.roe_pct,
            pnl_pct: eval.pnl.pnl_pct,
            capital_used: position.capital_used,
            net_pnl: eval.pnl.net_pnl,
            funding: eval.pnl.funding,
            stop_loss_pct: position.stop_loss_pct,
            take_profit_pct: position.take_profit_pct,
            trailing_pct: position.trailing_active.then_some(position.trail_offset_pct),
            exit_state: position.exit_state(),
            hours_held: position.hours_held,
        }
    }
}

/// Everything that happened to open positions during one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    /// Positions still open after the tick, by symbol.
    pub summaries: Vec<PositionSummary>,
    /// Exits applied this tick, by symbol.
    pub events: Vec<LedgerEvent>,
    /// Open symbols with no usable price this tick.
    pub skipped: Vec<String>,
}

impl TickReport {
    pub fn allocated(&self) -> f64 {
        self.summaries.iter().map(|s| s.capital_used).sum()
    }

    pub fn unrealized_net(&self) -> f64 {
        self.summaries.iter().map(|s| s.net_pnl).sum()
    }

    pub fn closed(&self) -> impl Iterator<Item = &TradeRecord> {
        self.events.iter().filter_map(|e| match e {
            LedgerEvent::Closed(r) => Some(r),
            LedgerEvent::Opened(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::sample_record;

    #[test]
    fn reject_categories() {
        assert_eq!(
            RejectReason::UnusablePrice.category(),
            RejectCategory::InputUnusable
        );
        assert_eq!(
            RejectReason::InvalidLeverage.category(),
            RejectCategory::InputUnusable
        );
        assert_eq!(
            RejectReason::CooldownActive.category(),
            RejectCategory::CapacityRejected
        );
        assert_eq!(
            RejectReason::InsufficientCash.category(),
            RejectCategory::InsufficientCash
        );
    }

    #[test]
    fn close_flash_tones() {
        let tp = LedgerEvent::Closed(sample_record(5.0, ExitReason::TakeProfit));
        assert_eq!(tp.flash().tone, FlashTone::Highlight);
        let trail = LedgerEvent::Closed(sample_record(5.0, ExitReason::TrailingStop));
        assert_eq!(trail.flash().tone, FlashTone::Profit);
        let sl = LedgerEvent::Closed(sample_record(-5.0, ExitReason::StopLoss));
        let flash = sl.flash();
        assert_eq!(flash.tone, FlashTone::Loss);
        assert!(flash.text.contains("due to STOP LOSS"));
        assert!(flash.text.contains("Result: LOSS"));
        assert_eq!(flash.timeout, FLASH_TIMEOUT);
    }

    #[test]
    fn flash_truncates_long_symbols() {
        assert_eq!(short_symbol("PF_VERYLONGSYMBOLUSD"), "PF_VERYLON");
        assert_eq!(short_symbol("PF_XBTUSD"), "PF_XBTUSD");
    }
}
