//! Portfolio ledger — cash, open positions, cooldowns and closed-trade history.
//!
//! The ledger is the only owner of positions. It is driven one snapshot at a
//! time: entries via [`Ledger::execute_trade`], exits via
//! [`Ledger::update_positions`], and session-end liquidation via
//! [`Ledger::liquidate_all`]. None of these return errors; unusable input and
//! gated entries degrade to no-ops reported as values.
//!
//! Accounting identity, holding after every operation:
//! `cash + Σ capital_used(open) == initial_cash + realized_pnl`.

pub mod events;

pub use events::{
    EntryNotice, EntryOutcome, FlashMessage, FlashTone, LedgerEvent, PositionSummary,
    RejectCategory, RejectReason, TickReport, FLASH_TIMEOUT,
};

use crate::domain::{
    Direction, ExitReason, MarketSnapshot, Position, Symbol, TradeClass, TradeRecord, TradeResult,
};
use crate::risk::{evaluate_tick, CostModel, EntryPlan, PnlBreakdown, RiskConfig};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Simulation state for one run.
#[derive(Debug, Clone)]
pub struct Ledger {
    config: RiskConfig,
    initial_cash: f64,
    cash: f64,
    realized_pnl: f64,
    positions: BTreeMap<Symbol, Position>,
    cooldowns: HashMap<Symbol, DateTime<Utc>>,
    last_prices: HashMap<Symbol, f64>,
    trade_history: Vec<TradeRecord>,
}

impl Ledger {
    pub fn new(initial_cash: f64, config: RiskConfig) -> Self {
        Self {
            config,
            initial_cash,
            cash: initial_cash,
            realized_pnl: 0.0,
            positions: BTreeMap::new(),
            cooldowns: HashMap::new(),
            last_prices: HashMap::new(),
            trade_history: Vec::new(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Swap in a new configuration between ticks.
    ///
    /// Applies to future entries and evaluations. Distances already fixed on
    /// open positions are kept.
    pub fn reload_config(&mut self, config: RiskConfig) {
        if config != self.config {
            info!(
                max_open_positions = config.max_open_positions,
                cooldown_secs = config.cooldown_secs,
                "risk config reloaded"
            );
        }
        self.config = config;
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn positions(&self) -> &BTreeMap<Symbol, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn trade_history(&self) -> &[TradeRecord] {
        &self.trade_history
    }

    /// Capital tied up in open positions.
    pub fn allocated_capital(&self) -> f64 {
        self.positions.values().map(|p| p.capital_used).sum()
    }

    /// Deviation from the accounting identity; zero up to rounding.
    pub fn conservation_error(&self) -> f64 {
        (self.cash + self.allocated_capital()) - (self.initial_cash + self.realized_pnl)
    }

    pub fn is_cooling_down(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        self.cooldowns.get(symbol).is_some_and(|closed_at| {
            (now - *closed_at).num_seconds() < self.config.cooldown_secs as i64
        })
    }

    /// Try to open a position on `symbol` at the snapshot's mark price.
    ///
    /// `leverage` falls back to the configured default. Pass
    /// `TradeClass::default()` (swing) when the caller has no preference.
    pub fn execute_trade(
        &mut self,
        symbol: &str,
        direction: Direction,
        snapshot: &MarketSnapshot,
        leverage: Option<u32>,
        trade_class: TradeClass,
    ) -> EntryOutcome {
        let now = snapshot.taken_at;
        let outcome = self.try_open(symbol, direction, snapshot, leverage, trade_class, now);
        if let EntryOutcome::Rejected(reason) = outcome {
            debug!(symbol, ?reason, "entry rejected");
        }
        outcome
    }

    fn try_open(
        &mut self,
        symbol: &str,
        direction: Direction,
        snapshot: &MarketSnapshot,
        leverage: Option<u32>,
        trade_class: TradeClass,
        now: DateTime<Utc>,
    ) -> EntryOutcome {
        if self.positions.len() >= self.config.max_open_positions {
            return EntryOutcome::Rejected(RejectReason::AtCapacity);
        }
        if self.is_cooling_down(symbol, now) {
            return EntryOutcome::Rejected(RejectReason::CooldownActive);
        }
        if self.positions.contains_key(symbol) {
            return EntryOutcome::Rejected(RejectReason::AlreadyOpen);
        }
        let Some(price) = snapshot.mark_price(symbol) else {
            return EntryOutcome::Rejected(RejectReason::UnusablePrice);
        };

        let leverage = leverage.unwrap_or(self.config.default_leverage);
        if leverage == 0 {
            return EntryOutcome::Rejected(RejectReason::InvalidLeverage);
        }
        let Some(plan) = EntryPlan::size(&self.config, self.cash, price, leverage, trade_class)
        else {
            return EntryOutcome::Rejected(RejectReason::InsufficientCash);
        };

        self.cash -= plan.cost;
        let position = plan.open(symbol, direction, now);
        self.last_prices.insert(symbol.to_string(), price);
        self.positions.insert(symbol.to_string(), position);

        info!(
            symbol,
            %direction,
            class = %trade_class,
            price,
            size = plan.size,
            capital_used = plan.cost,
            leverage,
            "entered position"
        );

        EntryOutcome::Opened(EntryNotice {
            symbol: symbol.to_string(),
            direction,
            trade_class,
            price,
            size: plan.size,
            leverage,
            capital_used: plan.cost,
            opened_at: now,
        })
    }

    /// Evaluate every open position against `snapshot`, in symbol order, and
    /// apply exits.
    ///
    /// Positions whose symbol is absent or unpriced are left untouched.
    pub fn update_positions(&mut self, snapshot: &MarketSnapshot) -> TickReport {
        let now = snapshot.taken_at;
        let mut report = TickReport::default();
        let symbols: Vec<Symbol> = self.positions.keys().cloned().collect();

        for symbol in symbols {
            let Some(price) = snapshot.mark_price(&symbol) else {
                report.skipped.push(symbol);
                continue;
            };
            self.last_prices.insert(symbol.clone(), price);

            let config = &self.config;
            let Some(position) = self.positions.get_mut(&symbol) else {
                continue;
            };
            let eval = evaluate_tick(position, price, config);
            for transition in &eval.transitions {
                debug!(symbol = %symbol, ?transition, price, "exit state changed");
            }

            match eval.exit {
                Some(reason) => {
                    if let Some(position) = self.positions.remove(&symbol) {
                        let record = self.close(position, price, eval.pnl, reason, now);
                        report.events.push(LedgerEvent::Closed(record));
                    }
                }
                None => report.summaries.push(PositionSummary::new(position, &eval)),
            }
        }

        report
    }

    /// Force-close everything at the last known price (entry price if the
    /// symbol was never priced after entry). Does not advance `hours_held`.
    pub fn liquidate_all(&mut self, at: DateTime<Utc>) -> Vec<LedgerEvent> {
        let cost = CostModel::from_config(&self.config);
        let positions = std::mem::take(&mut self.positions);
        positions
            .into_values()
            .map(|position| {
                let price = self
                    .last_prices
                    .get(&position.symbol)
                    .copied()
                    .unwrap_or(position.entry_price);
                let pnl = cost.breakdown(&position, price);
                LedgerEvent::Closed(self.close(position, price, pnl, ExitReason::ForcedExit, at))
            })
            .collect()
    }

    fn close(
        &mut self,
        position: Position,
        price: f64,
        pnl: PnlBreakdown,
        exit_reason: ExitReason,
        at: DateTime<Utc>,
    ) -> TradeRecord {
        self.cash += position.capital_used + pnl.net_pnl;
        self.realized_pnl += pnl.net_pnl;
        self.cooldowns.insert(position.symbol.clone(), at);
        self.last_prices.remove(&position.symbol);

        let result = TradeResult::from_net_pnl(pnl.net_pnl);
        info!(
            symbol = %position.symbol,
            price,
            result = result.label(),
            reason = %exit_reason,
            capital_used = position.capital_used,
            net_pnl = pnl.net_pnl,
            roe_pct = pnl.roe_pct * 100.0,
            fees = pnl.fees,
            funding = pnl.funding,
            "closed position"
        );

        let record = TradeRecord {
            symbol: position.symbol,
            direction: position.direction,
            trade_class: position.trade_class,
            leverage: position.leverage,
            entry_price: position.entry_price,
            exit_price: price,
            size: position.size,
            capital_used: position.capital_used,
            gross_pnl: pnl.gross_pnl,
            fees: pnl.fees,
            funding: pnl.funding,
            gain: pnl.net_pnl,
            roe: pnl.roe_pct,
            result,
            exit_reason,
            hours_held: position.hours_held,
            opened_at: position.opened_at,
            closed_at: at,
        };
        self.trade_history.push(record.clone());
        record
    }
}
