//! Per-tick exit evaluation — the position state machine.
//!
//! ```text
//! ActiveFixed ──(scalp, pnl > 0)──▶ Breakeven ──(scalp, ROE ≥ activation)──▶ Trailing
//!      │                                │                                      │
//!      └── SL / TP ──▶ Closed           └── SL at entry / TP ──▶ Closed        └── trail breach ──▶ Closed
//! ```
//!
//! Order within one tick:
//! 1. fold the price into the running extrema
//! 2. advance `hours_held`
//! 3. scalp breakeven transition
//! 4. scalp trailing transition
//! 5. exit check for the state reached in 3–4
//!
//! Both transitions are one-way. Stop-loss is checked before take-profit, so a
//! tick that breaches both closes as a stop.

use super::config::RiskConfig;
use super::cost::{CostModel, PnlBreakdown};
use crate::domain::{Direction, ExitReason, Position, TradeClass};
use serde::{Deserialize, Serialize};

/// A state change applied during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    BreakevenSet,
    TrailingActivated,
}

/// Result of evaluating one position against one price.
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvaluation {
    /// Mark price the position was evaluated at.
    pub price: f64,
    pub pnl: PnlBreakdown,
    /// Flags that flipped this tick, in the order they flipped.
    pub transitions: Vec<Transition>,
    /// Set when the position must close at `price`.
    pub exit: Option<ExitReason>,
}

/// Run steps 1–5 on `position` at `price`.
///
/// The position is mutated in place (extrema, age, one-way flags); closing it
/// is up to the caller.
pub fn evaluate_tick(position: &mut Position, price: f64, config: &RiskConfig) -> TickEvaluation {
    position.update_extrema(price);
    position.hours_held += config.tick_hours;

    let mut transitions = Vec::new();
    if position.trade_class == TradeClass::Scalp {
        let pnl_pct = position.pnl_pct(price);
        if !position.breakeven_set && pnl_pct > 0.0 {
            position.breakeven_set = true;
            position.stop_loss_pct = 0.0;
            transitions.push(Transition::BreakevenSet);
        }
        if !position.trailing_active && position.roe_pct(price) >= config.trailing_activation_roe {
            position.trailing_active = true;
            position.take_profit_pct = None;
            position.stop_loss_pct = 0.0;
            transitions.push(Transition::TrailingActivated);
        }
    }

    let exit = check_exit(position, price);
    let pnl = CostModel::from_config(config).breakdown(position, price);
    TickEvaluation {
        price,
        pnl,
        transitions,
        exit,
    }
}

/// Exit condition for the position's current state. Pure; no mutation.
pub fn check_exit(position: &Position, price: f64) -> Option<ExitReason> {
    if position.trailing_active {
        let breached = match position.direction {
            Direction::Long => price < position.max_price * (1.0 - position.trail_offset_pct),
            Direction::Short => price > position.min_price * (1.0 + position.trail_offset_pct),
        };
        return breached.then_some(ExitReason::TrailingStop);
    }

    let pnl_pct = position.pnl_pct(price);
    if pnl_pct <= -position.stop_loss_pct {
        return Some(if position.breakeven_set {
            ExitReason::BreakevenStop
        } else {
            ExitReason::StopLoss
        });
    }
    match position.take_profit_pct {
        Some(tp) if pnl_pct >= tp => Some(ExitReason::TakeProfit),
        _ => None,
    }
}
