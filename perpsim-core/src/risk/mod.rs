//! Risk engine — entry sizing, per-tick exit evaluation, fee/funding P&L.
//!
//! Nothing here owns state across ticks. The [`Ledger`](crate::ledger::Ledger)
//! calls in with a position and a price and applies the verdict.

pub mod config;
pub mod cost;
pub mod entry;
pub mod exit;

pub use config::{RiskConfig, RiskConfigError};
pub use cost::{CostModel, PnlBreakdown};
pub use entry::{EntryPlan, RiskDistances};
pub use exit::{check_exit, evaluate_tick, TickEvaluation, Transition};
