//! Momentum/funding selector — 24h change beyond a threshold, filtered by
//! volume and funding.
//!
//! Fires Long when `change24h > threshold` and Short when
//! `change24h < -threshold`. Longs paying too much funding and shorts paying
//! too much negative funding are dropped. Strong moves trade as scalps.

use super::{Candidate, SignalConfig, SignalSelector};
use crate::domain::{Direction, MarketSnapshot, Ticker, TradeClass};

#[derive(Debug, Clone)]
pub struct MomentumSelector {
    config: SignalConfig,
    threshold_override: Option<f64>,
}

impl MomentumSelector {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            threshold_override: None,
        }
    }

    /// Pin the momentum threshold regardless of later reconfiguration.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold_override = Some(threshold);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_override
            .unwrap_or(self.config.momentum_threshold)
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    fn evaluate(&self, symbol: &str, ticker: &Ticker) -> Option<Candidate> {
        ticker.usable_mark_price()?;
        let change = ticker.change_24h?;
        let volume = ticker.volume_quote?;
        if volume <= self.config.min_volume {
            return None;
        }

        let threshold = self.threshold();
        let direction = if change > threshold {
            Direction::Long
        } else if change < -threshold {
            Direction::Short
        } else {
            return None;
        };

        if let Some(funding) = ticker.funding_rate {
            let too_expensive = match direction {
                Direction::Long => funding > self.config.funding_rate_long,
                Direction::Short => funding < -self.config.funding_rate_short,
            };
            if too_expensive {
                return None;
            }
        }

        let strength = if threshold > 0.0 {
            change.abs() / threshold
        } else {
            f64::INFINITY
        };
        let (trade_class, leverage) = if strength >= self.config.scalp_strength {
            (TradeClass::Scalp, self.config.scalp_leverage)
        } else {
            (TradeClass::Swing, self.config.swing_leverage)
        };

        Some(Candidate {
            symbol: symbol.to_string(),
            direction,
            leverage,
            trade_class,
            strength,
        })
    }
}

impl Default for MomentumSelector {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

impl SignalSelector for MomentumSelector {
    fn name(&self) -> &str {
        "momentum_funding"
    }

    fn select(&self, snapshot: &MarketSnapshot, limit: usize) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = snapshot
            .tickers
            .iter()
            .filter_map(|(symbol, ticker)| self.evaluate(symbol, ticker))
            .collect();
        // tickers iterate in symbol order and the sort is stable
        candidates.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        candidates.truncate(limit);
        candidates
    }

    fn reconfigure(&mut self, config: &SignalConfig) {
        self.config = config.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(tickers: Vec<(&str, Ticker)>) -> MarketSnapshot {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        tickers
            .into_iter()
            .fold(MarketSnapshot::new(at), |s, (sym, t)| s.with_ticker(sym, t))
    }

    fn mover(change: f64) -> Ticker {
        Ticker::with_mark(10.0).change(change).volume(100_000.0)
    }

    #[test]
    fn fires_both_directions() {
        let sel = MomentumSelector::default();
        let snap = snapshot(vec![("PF_UP", mover(8.0)), ("PF_DOWN", mover(-9.0)), ("PF_FLAT", mover(3.0))]);
        let out = sel.select(&snap, 10);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].symbol, "PF_DOWN");
        assert_eq!(out[0].direction, Direction::Short);
        assert_eq!(out[1].direction, Direction::Long);
    }

    #[test]
    fn threshold_is_exclusive() {
        let sel = MomentumSelector::default();
        assert!(sel.select(&snapshot(vec![("PF_EDGE", mover(7.0))]), 10).is_empty());
    }

    #[test]
    fn volume_and_missing_fields_gate() {
        let sel = MomentumSelector::default();
        let snap = snapshot(vec![
            ("PF_THIN", Ticker::with_mark(10.0).change(12.0).volume(50_000.0)),
            ("PF_NOVOL", Ticker::with_mark(10.0).change(12.0)),
            ("PF_NOPRICE", Ticker::default().change(12.0).volume(1e6)),
        ]);
        assert!(sel.select(&snap, 10).is_empty());
    }

    #[test]
    fn funding_filter() {
        let sel = MomentumSelector::default();
        let snap = snapshot(vec![
            ("PF_LONGHOT", mover(8.0).funding(0.002)),
            ("PF_SHORTHOT", mover(-8.0).funding(-0.002)),
            ("PF_LONGOK", mover(8.0).funding(-0.002)),
            ("PF_SHORTOK", mover(-8.0).funding(0.002)),
        ]);
        let symbols: Vec<_> = sel.select(&snap, 10).into_iter().map(|c| c.symbol).collect();
        assert_eq!(symbols, vec!["PF_LONGOK", "PF_SHORTOK"]);
    }

    #[test]
    fn strong_moves_become_scalps() {
        let sel = MomentumSelector::default();
        let snap = snapshot(vec![("PF_MOON", mover(14.0)), ("PF_MILD", mover(10.0))]);
        let out = sel.select(&snap, 10);
        assert_eq!(out[0].symbol, "PF_MOON");
        assert_eq!(out[0].trade_class, TradeClass::Scalp);
        assert_eq!(out[0].leverage, 20);
        assert!((out[0].strength - 2.0).abs() < 1e-12);
        assert_eq!(out[1].trade_class, TradeClass::Swing);
        assert_eq!(out[1].leverage, 10);
    }

    #[test]
    fn ties_break_by_symbol_and_limit_truncates() {
        let sel = MomentumSelector::default();
        let snap = snapshot(vec![("PF_C", mover(8.0)), ("PF_A", mover(8.0)), ("PF_B", mover(-8.0))]);
        let out = sel.select(&snap, 2);
        let symbols: Vec<_> = out.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["PF_A", "PF_B"]);
    }

    #[test]
    fn override_survives_reconfigure() {
        let mut sel = MomentumSelector::default().with_threshold(3.0);
        sel.reconfigure(&SignalConfig {
            momentum_threshold: 20.0,
            ..SignalConfig::default()
        });
        assert_eq!(sel.threshold(), 3.0);
        assert_eq!(sel.select(&snapshot(vec![("PF_X", mover(4.0))]), 10).len(), 1);
    }
}
