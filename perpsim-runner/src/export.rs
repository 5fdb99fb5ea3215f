//! Session artifacts — trade tape as CSV and JSON, summary as JSON.
//!
//! Written once at session end into the output directory:
//! - `trades.csv` — one row per closed trade
//! - `trades.json` — the same history, full precision
//! - `summary.json` — [`SessionSummary`] plus the config id

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use perpsim_core::domain::TradeRecord;

use crate::metrics::SessionSummary;

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub config_id: String,
    pub ticks: u64,
    pub summary: SessionSummary,
}

/// Files produced by [`write_artifacts`].
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub trades_csv: PathBuf,
    pub trades_json: PathBuf,
    pub summary_json: PathBuf,
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape as CSV.
///
/// Columns: symbol, direction, class, leverage, entry_price, exit_price, size,
/// capital_used, gross_pnl, fees, funding, net_pnl, roe_pct, result,
/// exit_reason, hours_held, opened_at, closed_at
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "symbol",
        "direction",
        "class",
        "leverage",
        "entry_price",
        "exit_price",
        "size",
        "capital_used",
        "gross_pnl",
        "fees",
        "funding",
        "net_pnl",
        "roe_pct",
        "result",
        "exit_reason",
        "hours_held",
        "opened_at",
        "closed_at",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.direction.label().to_string(),
            t.trade_class.label().to_string(),
            t.leverage.to_string(),
            format!("{:.6}", t.entry_price),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.size),
            format!("{:.2}", t.capital_used),
            format!("{:.4}", t.gross_pnl),
            format!("{:.4}", t.fees),
            format!("{:.4}", t.funding),
            format!("{:.4}", t.gain),
            format!("{:.2}", t.roe * 100.0),
            t.result.label().to_string(),
            t.exit_reason.label().to_string(),
            format!("{:.4}", t.hours_held),
            t.opened_at.to_rfc3339(),
            t.closed_at.to_rfc3339(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_trades_json(trades: &[TradeRecord]) -> Result<String> {
    serde_json::to_string_pretty(trades).context("failed to serialize trade history")
}

pub fn import_trades_json(json: &str) -> Result<Vec<TradeRecord>> {
    serde_json::from_str(json).context("failed to deserialize trade history")
}

pub fn export_report_json(report: &SessionReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize session report")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write all three artifacts into `output_dir`, creating it if needed.
pub fn write_artifacts(
    output_dir: &Path,
    trades: &[TradeRecord],
    report: &SessionReport,
) -> Result<ArtifactPaths> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let paths = ArtifactPaths {
        trades_csv: output_dir.join("trades.csv"),
        trades_json: output_dir.join("trades.json"),
        summary_json: output_dir.join("summary.json"),
    };

    write_file(&paths.trades_csv, &export_trades_csv(trades)?)?;
    write_file(&paths.trades_json, &export_trades_json(trades)?)?;
    write_file(&paths.summary_json, &export_report_json(report)?)?;

    Ok(paths)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use perpsim_core::domain::{Direction, ExitReason, TradeClass, TradeResult};

    fn trade(symbol: &str, gain: f64) -> TradeRecord {
        TradeRecord {
            symbol: symbol.into(),
            direction: Direction::Short,
            trade_class: TradeClass::Scalp,
            leverage: 20,
            entry_price: 50.0,
            exit_price: 49.5,
            size: 10.0,
            capital_used: 500.3,
            gross_pnl: 5.0,
            fees: 0.6,
            funding: 0.01,
            gain,
            roe: 0.2,
            result: TradeResult::from_net_pnl(gain),
            exit_reason: ExitReason::TrailingStop,
            hours_held: 0.25,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            closed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 15, 0).unwrap(),
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = export_trades_csv(&[trade("PF_SOLUSD", 4.39), trade("PF_ETHUSD", -1.0)]).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol,direction,class,leverage"));
        assert!(lines[1].starts_with("PF_SOLUSD,SHORT,scalp,20,50.000000"));
        assert!(lines[1].contains("TRAILING STOP"));
        assert!(lines[2].contains(",LOSS,"));
    }

    #[test]
    fn json_roundtrip() {
        let trades = vec![trade("PF_SOLUSD", 4.39)];
        let json = export_trades_json(&trades).unwrap();
        assert!(json.contains("\"exit_reason\": \"TRAILING STOP\""));
        assert_eq!(import_trades_json(&json).unwrap(), trades);
    }
}
