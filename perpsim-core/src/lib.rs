//! PerpSim Core — domain types, risk engine, portfolio ledger, signal selection.
//!
//! This crate contains the position lifecycle of the simulator:
//! - Domain types (snapshots, positions, closed-trade records)
//! - Entry sizing and risk distances per trade class
//! - Per-tick exit state machine (fixed, breakeven, trailing)
//! - Fee- and funding-adjusted P&L
//! - Ledger with cash, cooldowns and trade history
//! - Momentum/funding candidate selection
//!
//! Nothing here performs I/O or reads the wall clock. Every time-dependent
//! rule uses the snapshot's capture time, so identical snapshot sequences
//! produce identical histories.

pub mod domain;
pub mod ledger;
pub mod risk;
pub mod signals;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across threads are Send + Sync.
    ///
    /// The optimizer runs one ledger per worker thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::MarketSnapshot>();
        require_sync::<domain::MarketSnapshot>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();

        require_send::<risk::RiskConfig>();
        require_sync::<risk::RiskConfig>();
        require_send::<ledger::Ledger>();
        require_sync::<ledger::Ledger>();
        require_send::<ledger::TickReport>();
        require_sync::<ledger::TickReport>();

        require_send::<signals::MomentumSelector>();
        require_sync::<signals::MomentumSelector>();
        require_send::<Box<dyn signals::SignalSelector>>();
    }
}
