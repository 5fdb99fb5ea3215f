//! Signal selection — turns a market snapshot into ranked directional candidates.
//!
//! Selectors are portfolio-agnostic: they see only the snapshot, never the
//! ledger. Whether a candidate becomes a position is the ledger's decision.

pub mod momentum;

pub use momentum::MomentumSelector;

use crate::domain::{Direction, MarketSnapshot, TradeClass};
use serde::{Deserialize, Serialize};

/// One directional trade suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub direction: Direction,
    pub leverage: u32,
    pub trade_class: TradeClass,
    /// How far the triggering measure exceeds its threshold (1.0 = at threshold).
    pub strength: f64,
}

/// Tunables for [`MomentumSelector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Absolute 24h change, in percent, required to trigger.
    pub momentum_threshold: f64,
    /// Minimum 24h quote volume.
    pub min_volume: f64,
    /// Longs are skipped when funding is above this.
    pub funding_rate_long: f64,
    /// Shorts are skipped when funding is below the negation of this.
    pub funding_rate_short: f64,
    pub swing_leverage: u32,
    pub scalp_leverage: u32,
    /// Strength at or above which a candidate is traded as a scalp.
    pub scalp_strength: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            momentum_threshold: 7.0,
            min_volume: 50_000.0,
            funding_rate_long: 0.001,
            funding_rate_short: 0.001,
            swing_leverage: 10,
            scalp_leverage: 20,
            scalp_strength: 2.0,
        }
    }
}

/// Trait for candidate selectors.
pub trait SignalSelector: Send + Sync {
    /// Human-readable name (e.g., "momentum_funding").
    fn name(&self) -> &str;

    /// Ranked candidates for this snapshot, strongest first, at most `limit`.
    fn select(&self, snapshot: &MarketSnapshot, limit: usize) -> Vec<Candidate>;

    /// Apply a reloaded configuration. Selectors without tunables ignore it.
    fn reconfigure(&mut self, _config: &SignalConfig) {}
}
