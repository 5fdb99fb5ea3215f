//! Domain types for PerpSim

pub mod position;
pub mod snapshot;
pub mod trade;

pub use position::{Direction, ExitState, Position, TradeClass};
pub use snapshot::{MarketSnapshot, PriceUsability, Ticker};
pub use trade::{ExitReason, TradeRecord, TradeResult};

/// Symbol type alias
pub type Symbol = String;
