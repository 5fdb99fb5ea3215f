//! Session driver — the tick loop.
//!
//! Each tick:
//! 1. apply a pending configuration change, if any
//! 2. pull one snapshot from the source
//! 3. select candidates and attempt entries
//! 4. evaluate every open position
//! 5. report to the observer, then pause
//!
//! Entries always run before exits within a tick. The loop ends on a stop
//! request, end of stream, or the tick limit, and every exit path liquidates
//! what is still open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use perpsim_core::domain::MarketSnapshot;
use perpsim_core::ledger::{EntryOutcome, Ledger, LedgerEvent, TickReport};
use perpsim_core::signals::{MomentumSelector, SignalSelector};

use crate::config::{ConfigReloader, SessionSettings, SimConfig};
use crate::source::{SnapshotSource, SourceError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("snapshot source gave up after {failures} consecutive failures: {last_error}")]
    SourceExhausted {
        failures: u32,
        #[source]
        last_error: SourceError,
    },
}

/// Shared stop flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the session to stop after the current tick.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEnd {
    StopRequested,
    EndOfStream,
    TickLimit,
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub ticks: u64,
    pub end: SessionEnd,
    /// Force-close events from session-end liquidation.
    pub liquidation: Vec<LedgerEvent>,
}

/// Everything one tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Accepted entries, in candidate order.
    pub entries: Vec<LedgerEvent>,
    pub report: TickReport,
}

impl TickOutcome {
    /// Entries followed by exits.
    pub fn events(&self) -> impl Iterator<Item = &LedgerEvent> {
        self.entries.iter().chain(self.report.events.iter())
    }
}

/// One tick as seen by an observer.
pub struct TickUpdate<'a> {
    pub tick: u64,
    pub snapshot: &'a MarketSnapshot,
    pub outcome: &'a TickOutcome,
    pub ledger: &'a Ledger,
}

/// Presentation hook. Both methods default to no-ops.
pub trait TickObserver {
    fn on_tick(&mut self, _update: &TickUpdate<'_>) {}

    fn on_liquidation(&mut self, _events: &[LedgerEvent], _ledger: &Ledger) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl TickObserver for NoopObserver {}

/// Run selection, entries and exit evaluation for one snapshot.
///
/// Candidates whose symbol is absent from the snapshot are skipped.
pub fn run_tick(
    ledger: &mut Ledger,
    selector: &dyn SignalSelector,
    snapshot: &MarketSnapshot,
    limit: usize,
) -> TickOutcome {
    let mut entries = Vec::new();
    for candidate in selector.select(snapshot, limit) {
        if !snapshot.contains(&candidate.symbol) {
            continue;
        }
        let outcome = ledger.execute_trade(
            &candidate.symbol,
            candidate.direction,
            snapshot,
            Some(candidate.leverage),
            candidate.trade_class,
        );
        if let EntryOutcome::Opened(notice) = outcome {
            entries.push(LedgerEvent::Opened(notice));
        }
    }
    let report = ledger.update_positions(snapshot);
    TickOutcome { entries, report }
}

pub struct Session<S: SnapshotSource> {
    ledger: Ledger,
    source: S,
    selector: Box<dyn SignalSelector>,
    settings: SessionSettings,
    stop: StopHandle,
    reloader: Option<ConfigReloader>,
    last_snapshot_at: Option<DateTime<Utc>>,
}

impl<S: SnapshotSource> Session<S> {
    /// Session with a fresh ledger and a momentum selector built from `config`.
    pub fn new(config: &SimConfig, source: S) -> Self {
        Self {
            ledger: Ledger::new(config.starting_capital, config.risk.clone()),
            source,
            selector: Box::new(MomentumSelector::new(config.signals.clone())),
            settings: config.session.clone(),
            stop: StopHandle::new(),
            reloader: None,
            last_snapshot_at: None,
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn SignalSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_reloader(mut self, reloader: ConfigReloader) -> Self {
        self.reloader = Some(reloader);
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Drive the loop to completion.
    ///
    /// On `Err` the ledger has already been liquidated.
    pub fn run(&mut self, observer: &mut dyn TickObserver) -> Result<SessionOutcome, SessionError> {
        info!(
            source = self.source.name(),
            selector = self.selector.name(),
            cash = self.ledger.cash(),
            "session started"
        );

        let mut ticks: u64 = 0;
        let mut failures: u32 = 0;
        let end = loop {
            if self.stop.is_stop_requested() {
                break SessionEnd::StopRequested;
            }
            if self.settings.max_ticks.is_some_and(|max| ticks >= max) {
                break SessionEnd::TickLimit;
            }
            self.apply_reload();

            let snapshot = match self.source.next_snapshot() {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => break SessionEnd::EndOfStream,
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "snapshot retrieval failed");
                    if self
                        .settings
                        .max_consecutive_failures
                        .is_some_and(|max| failures > max)
                    {
                        self.liquidate(observer);
                        return Err(SessionError::SourceExhausted {
                            failures,
                            last_error: e,
                        });
                    }
                    self.pause(Duration::from_millis(self.settings.retry_backoff_ms));
                    continue;
                }
            };
            failures = 0;

            let outcome = run_tick(
                &mut self.ledger,
                self.selector.as_ref(),
                &snapshot,
                self.settings.signal_limit,
            );
            ticks += 1;
            self.last_snapshot_at = Some(snapshot.taken_at);
            observer.on_tick(&TickUpdate {
                tick: ticks,
                snapshot: &snapshot,
                outcome: &outcome,
                ledger: &self.ledger,
            });

            self.pause(Duration::from_millis(self.settings.tick_interval_ms));
        };

        let liquidation = self.liquidate(observer);
        info!(
            ticks,
            ?end,
            cash = self.ledger.cash(),
            realized_pnl = self.ledger.realized_pnl(),
            trades = self.ledger.trade_history().len(),
            "session finished"
        );
        Ok(SessionOutcome {
            ticks,
            end,
            liquidation,
        })
    }

    fn apply_reload(&mut self) {
        let Some(config) = self.reloader.as_mut().and_then(ConfigReloader::poll) else {
            return;
        };
        self.ledger.reload_config(config.risk);
        self.selector.reconfigure(&config.signals);
        self.settings = reloaded_settings(&self.settings, config.session);
    }

    fn liquidate(&mut self, observer: &mut dyn TickObserver) -> Vec<LedgerEvent> {
        let at = self.last_snapshot_at.unwrap_or_else(Utc::now);
        let events = self.ledger.liquidate_all(at);
        if !events.is_empty() {
            info!(count = events.len(), "liquidated open positions");
        }
        observer.on_liquidation(&events, &self.ledger);
        events
    }

    /// Sleep in short slices so a stop request is honored promptly.
    fn pause(&self, total: Duration) {
        const SLICE: Duration = Duration::from_millis(100);
        let mut left = total;
        while !left.is_zero() && !self.stop.is_stop_requested() {
            let step = left.min(SLICE);
            std::thread::sleep(step);
            left -= step;
        }
    }
}

/// Settings after a reload. The tick limit and the source connection are
/// fixed when the session starts; changes to the latter need a restart.
fn reloaded_settings(current: &SessionSettings, incoming: SessionSettings) -> SessionSettings {
    if incoming.kraken_base_url != current.kraken_base_url
        || incoming.request_timeout_secs != current.request_timeout_secs
    {
        warn!(
            kraken_base_url = %incoming.kraken_base_url,
            request_timeout_secs = incoming.request_timeout_secs,
            "source settings changed; restart to apply them"
        );
    }
    SessionSettings {
        max_ticks: current.max_ticks,
        kraken_base_url: current.kraken_base_url.clone(),
        request_timeout_secs: current.request_timeout_secs,
        ..incoming
    }
}
