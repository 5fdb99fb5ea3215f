//! Criterion benchmarks for PerpSim hot paths.
//!
//! Benchmarks:
//! 1. Per-tick position update with a full book
//! 2. Candidate selection over a large snapshot
//! 3. Full open → evaluate → liquidate cycle

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use perpsim_core::domain::{Direction, MarketSnapshot, Ticker, TradeClass};
use perpsim_core::ledger::Ledger;
use perpsim_core::risk::RiskConfig;
use perpsim_core::signals::{MomentumSelector, SignalSelector};

// ── Helpers ──────────────────────────────────────────────────────────

fn symbols(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("PF_S{i:04}USD")).collect()
}

fn make_snapshots(symbols: &[String], ticks: usize) -> Vec<MarketSnapshot> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..ticks)
        .map(|t| {
            let mut snap = MarketSnapshot::new(start + Duration::minutes(5 * t as i64));
            for (i, sym) in symbols.iter().enumerate() {
                let phase = (t as f64 * 0.1 + i as f64).sin();
                let ticker = Ticker::with_mark(100.0 + phase * 0.4)
                    .change(phase * 15.0)
                    .volume(250_000.0)
                    .funding(0.0001);
                snap.insert(sym.clone(), ticker);
            }
            snap
        })
        .collect()
}

fn full_ledger(symbols: &[String], snap: &MarketSnapshot) -> Ledger {
    let config = RiskConfig {
        max_open_positions: symbols.len(),
        ..RiskConfig::default()
    };
    let mut ledger = Ledger::new(1_000_000.0, config);
    for (i, sym) in symbols.iter().enumerate() {
        let (dir, class) = if i % 2 == 0 {
            (Direction::Long, TradeClass::Scalp)
        } else {
            (Direction::Short, TradeClass::Swing)
        };
        ledger.execute_trade(sym, dir, snap, Some(20), class);
    }
    ledger
}

// ── 1. Position update ───────────────────────────────────────────────

fn bench_update_positions(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_positions");
    for n in [20usize, 200] {
        let syms = symbols(n);
        let snaps = make_snapshots(&syms, 2);
        let ledger = full_ledger(&syms, &snaps[0]);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut l = ledger.clone();
                black_box(l.update_positions(black_box(&snaps[1])))
            })
        });
    }
    group.finish();
}

// ── 2. Selection ─────────────────────────────────────────────────────

fn bench_select(c: &mut Criterion) {
    let syms = symbols(500);
    let snap = make_snapshots(&syms, 1).remove(0);
    let selector = MomentumSelector::default();
    c.bench_function("momentum_select_500", |b| {
        b.iter(|| black_box(selector.select(black_box(&snap), 20)))
    });
}

// ── 3. Full cycle ────────────────────────────────────────────────────

fn bench_session_cycle(c: &mut Criterion) {
    let syms = symbols(50);
    let snaps = make_snapshots(&syms, 288);
    let selector = MomentumSelector::default();
    c.bench_function("cycle_288_ticks", |b| {
        b.iter(|| {
            let mut ledger = Ledger::new(10_000.0, RiskConfig::default());
            for snap in &snaps {
                for cand in selector.select(snap, 20) {
                    ledger.execute_trade(&cand.symbol, cand.direction, snap, Some(cand.leverage), cand.trade_class);
                }
                ledger.update_positions(snap);
            }
            let end = snaps.last().map(|s| s.taken_at).unwrap_or_else(Utc::now);
            ledger.liquidate_all(end);
            black_box(ledger.trade_history().len())
        })
    });
}

criterion_group!(benches, bench_update_positions, bench_select, bench_session_cycle);
criterion_main!(benches);
