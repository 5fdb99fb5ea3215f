//! Session metrics — pure functions over the closed-trade history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use perpsim_core::domain::TradeRecord;
use perpsim_core::ledger::Ledger;

/// End-of-session statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_net_pnl: f64,
    pub total_fees: f64,
    pub total_funding: f64,
    pub capital_deployed: f64,
    /// Net P&L over capital deployed.
    pub return_on_capital: f64,
    pub profit_factor: f64,
    /// Closed trades per exit reason label.
    pub exits_by_reason: BTreeMap<String, usize>,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub open_positions: usize,
    /// BLAKE3 over the serialized history; identical runs share it.
    pub history_digest: String,
}

impl SessionSummary {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let mut summary = Self::compute(ledger.trade_history(), ledger.initial_cash(), ledger.cash());
        summary.open_positions = ledger.open_count();
        summary
    }

    pub fn compute(trades: &[TradeRecord], initial_cash: f64, final_cash: f64) -> Self {
        let wins = trades.iter().filter(|t| t.is_winner()).count();
        let mut exits_by_reason = BTreeMap::new();
        for t in trades {
            *exits_by_reason
                .entry(t.exit_reason.label().to_string())
                .or_insert(0) += 1;
        }
        Self {
            trade_count: trades.len(),
            wins,
            losses: trades.len() - wins,
            win_rate: win_rate(trades),
            total_net_pnl: trades.iter().map(|t| t.gain).sum(),
            total_fees: trades.iter().map(|t| t.fees).sum(),
            total_funding: trades.iter().map(|t| t.funding).sum(),
            capital_deployed: capital_deployed(trades),
            return_on_capital: return_on_capital(trades),
            profit_factor: profit_factor(trades),
            exits_by_reason,
            initial_cash,
            final_cash,
            open_positions: 0,
            history_digest: history_digest(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn capital_deployed(trades: &[TradeRecord]) -> f64 {
    trades.iter().map(|t| t.capital_used).sum()
}

/// Σ net gain / Σ capital used; 0 when nothing was deployed.
pub fn return_on_capital(trades: &[TradeRecord]) -> f64 {
    let deployed = capital_deployed(trades);
    if deployed <= 0.0 {
        return 0.0;
    }
    trades.iter().map(|t| t.gain).sum::<f64>() / deployed
}

/// Gross profits / gross losses, capped at 100.0 (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.gain > 0.0).map(|t| t.gain).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.gain < 0.0)
        .map(|t| t.gain.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Hex BLAKE3 digest of the history, one JSON record per trade.
pub fn history_digest(trades: &[TradeRecord]) -> String {
    let mut hasher = blake3::Hasher::new();
    for t in trades {
        // plain data always serializes
        let json = serde_json::to_vec(t).unwrap_or_default();
        hasher.update(&json);
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use perpsim_core::domain::{Direction, ExitReason, TradeClass, TradeResult};

    fn trade(gain: f64, reason: ExitReason) -> TradeRecord {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TradeRecord {
            symbol: "PF_XBTUSD".into(),
            direction: Direction::Long,
            trade_class: TradeClass::Swing,
            leverage: 10,
            entry_price: 100.0,
            exit_price: 100.0,
            size: 10.0,
            capital_used: 1000.0,
            gross_pnl: gain,
            fees: 1.2,
            funding: 0.1,
            gain,
            roe: gain / 1000.0,
            result: TradeResult::from_net_pnl(gain),
            exit_reason: reason,
            hours_held: 0.5,
            opened_at: at,
            closed_at: at,
        }
    }

    #[test]
    fn empty_history() {
        let s = SessionSummary::compute(&[], 10_000.0, 10_000.0);
        assert_eq!(s.trade_count, 0);
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.return_on_capital, 0.0);
        assert_eq!(s.profit_factor, 0.0);
        assert!(s.exits_by_reason.is_empty());
    }

    #[test]
    fn mixed_history() {
        let trades = vec![
            trade(30.0, ExitReason::TakeProfit),
            trade(-10.0, ExitReason::StopLoss),
            trade(-5.0, ExitReason::StopLoss),
            trade(5.0, ExitReason::TrailingStop),
        ];
        let s = SessionSummary::compute(&trades, 10_000.0, 10_020.0);
        assert_eq!(s.wins, 2);
        assert_eq!(s.losses, 2);
        assert!((s.win_rate - 0.5).abs() < 1e-12);
        assert!((s.total_net_pnl - 20.0).abs() < 1e-12);
        assert!((s.return_on_capital - 20.0 / 4000.0).abs() < 1e-12);
        assert!((s.profit_factor - 35.0 / 15.0).abs() < 1e-12);
        assert!((s.total_fees - 4.8).abs() < 1e-12);
        assert_eq!(s.exits_by_reason["STOP LOSS"], 2);
        assert_eq!(s.exits_by_reason["TAKE PROFIT"], 1);
    }

    #[test]
    fn zero_net_counts_as_loss() {
        let s = SessionSummary::compute(&[trade(0.0, ExitReason::ForcedExit)], 1.0, 1.0);
        assert_eq!(s.losses, 1);
        assert_eq!(s.profit_factor, 0.0);
    }

    #[test]
    fn profit_factor_capped() {
        assert_eq!(profit_factor(&[trade(5.0, ExitReason::TakeProfit)]), 100.0);
    }

    #[test]
    fn digest_tracks_content() {
        let a = vec![trade(1.0, ExitReason::TakeProfit)];
        let b = vec![trade(2.0, ExitReason::TakeProfit)];
        assert_eq!(history_digest(&a), history_digest(&a.clone()));
        assert_ne!(history_digest(&a), history_digest(&b));
        assert_eq!(history_digest(&[]).len(), 64);
    }
}
