//! PerpSim CLI — live, replay, record and evolve commands.
//!
//! Commands:
//! - `run` — simulate against live Kraken Futures tickers
//! - `replay` — simulate against a recorded JSONL snapshot file
//! - `record` — append live snapshots to a JSONL file without trading
//! - `evolve` — genetic search over the momentum threshold on recorded snapshots
//! - `init-config` — write the default configuration as TOML
//!
//! While a session runs, typing `q` and Enter stops it after the current tick.

mod console;
mod logging;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use perpsim_runner::evolve::{export_evolution_csv, export_generation_csv};
use perpsim_runner::source::load_snapshots;
use perpsim_runner::{
    evolve, write_artifacts, ConfigReloader, KrakenTickerSource, ReplaySource, Session,
    SessionReport, SessionSummary, SimConfig, SnapshotRecorder, SnapshotSource, StopHandle,
};

use console::ConsoleObserver;

#[derive(Parser)]
#[command(
    name = "perpsim",
    about = "PerpSim — leveraged perpetual-futures trading simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every session-style command.
#[derive(Args, Clone, Debug, Default)]
struct CommonArgs {
    /// Path to a TOML config file. Watched for changes while running.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for trades.csv, trades.json and summary.json.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Directory for simulation.log.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Stop after this many ticks.
    #[arg(long)]
    ticks: Option<u64>,

    /// Suppress per-tick console output.
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate against live Kraken Futures tickers.
    Run {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Simulate against a recorded JSONL snapshot file.
    Replay {
        /// Snapshot file written by `record`.
        file: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Append live snapshots to a JSONL file.
    Record {
        /// Destination file. Appended to if it exists.
        file: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Evolve the momentum threshold against recorded snapshots.
    Evolve {
        /// Snapshot file written by `record`.
        file: PathBuf,

        /// Results CSV. Defaults to <output-dir>/evolution_results.csv.
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Write the default configuration.
    InitConfig {
        #[arg(default_value = "perpsim.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { common } => {
            let (config, _log_guard) = load_config(&common)?;
            let source = KrakenTickerSource::new(
                &config.session.kraken_base_url,
                Duration::from_secs(config.session.request_timeout_secs),
            )?;
            run_session(&config, &common, source)
        }
        Commands::Replay { file, common } => {
            let (config, _log_guard) = load_config(&common)?;
            let source = ReplaySource::from_path(&file)?;
            println!("Replaying {} snapshot(s) from {}", source.remaining(), file.display());
            run_session(&config, &common, source)
        }
        Commands::Record { file, common } => {
            let (config, _log_guard) = load_config(&common)?;
            run_record(&config, &file)
        }
        Commands::Evolve { file, out, common } => {
            let (config, _log_guard) = load_config(&common)?;
            run_evolve(&config, &file, out)
        }
        Commands::InitConfig { path, force } => run_init_config(&path, force),
    }
}

/// Load the config (or defaults), apply command-line overrides, start logging.
///
/// The returned guard flushes the log file when dropped.
fn load_config(common: &CommonArgs) -> Result<(SimConfig, Option<WorkerGuard>)> {
    let mut config = SimConfig::load_or_default(common.config.as_deref())?;
    if let Some(dir) = &common.output_dir {
        config.output.output_dir = dir.clone();
    }
    if let Some(dir) = &common.log_dir {
        config.output.log_dir = dir.clone();
    }
    if common.ticks.is_some() {
        config.session.max_ticks = common.ticks;
    }
    config.output.quiet |= common.quiet;

    let guard = logging::init_logging(&config.output.log_dir);
    Ok((config, guard))
}

fn run_session<S: SnapshotSource>(config: &SimConfig, common: &CommonArgs, source: S) -> Result<()> {
    let config_id = config.config_id();
    println!("Config ID: {config_id}");
    println!("Starting capital: ${:.2}", config.starting_capital);
    println!("Type 'q' and press Enter to stop.");

    let mut session = Session::new(config, source);
    if let Some(path) = &common.config {
        session = session.with_reloader(ConfigReloader::new(path));
    }
    spawn_quit_listener(session.stop_handle());

    let mut observer = ConsoleObserver::new(config.output.quiet);
    let started = Utc::now();
    let outcome = session.run(&mut observer);
    let elapsed = Utc::now() - started;
    let ticks = match &outcome {
        Ok(outcome) => outcome.ticks,
        Err(_) => observer.ticks(),
    };

    // Artifacts are written even when the source gave up.
    let ledger = session.ledger();
    let report = SessionReport {
        config_id,
        ticks,
        summary: SessionSummary::from_ledger(ledger),
    };
    let paths = write_artifacts(&config.output.output_dir, ledger.trade_history(), &report)?;
    print_summary(&report)?;
    println!("Elapsed:        {}s", elapsed.num_seconds());
    println!("Artifacts saved to: {}", config.output.output_dir.display());
    println!("  {}", paths.trades_csv.display());
    println!("  {}", paths.trades_json.display());
    println!("  {}", paths.summary_json.display());

    let outcome = outcome.context("session aborted")?;
    info!(end = ?outcome.end, ticks = outcome.ticks, "session complete");
    Ok(())
}

fn run_record(config: &SimConfig, file: &Path) -> Result<()> {
    let mut source = KrakenTickerSource::new(
        &config.session.kraken_base_url,
        Duration::from_secs(config.session.request_timeout_secs),
    )?;
    let recorder = SnapshotRecorder::new(file);
    let stop = StopHandle::new();
    spawn_quit_listener(stop.clone());
    println!("Recording from {} into {}. Type 'q' and press Enter to stop.", source.url(), file.display());

    let settings = &config.session;
    let mut recorded: u64 = 0;
    let mut failures: u32 = 0;
    while !stop.is_stop_requested() && settings.max_ticks.map_or(true, |max| recorded < max) {
        match source.next_snapshot() {
            Ok(Some(snapshot)) => {
                failures = 0;
                recorder
                    .append(&snapshot)
                    .with_context(|| format!("failed to append to {}", file.display()))?;
                recorded += 1;
                if !config.output.quiet {
                    println!(
                        "[{}] recorded {} tickers",
                        snapshot.taken_at.format("%H:%M:%S"),
                        snapshot.len()
                    );
                }
                sleep_unless_stopped(&stop, Duration::from_millis(settings.tick_interval_ms));
            }
            Ok(None) => break,
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "snapshot retrieval failed");
                if settings.max_consecutive_failures.is_some_and(|max| failures > max) {
                    bail!("giving up after {failures} consecutive failures: {e}");
                }
                sleep_unless_stopped(&stop, Duration::from_millis(settings.retry_backoff_ms));
            }
        }
    }

    println!("Recorded {recorded} snapshot(s) to {}", file.display());
    Ok(())
}

fn run_evolve(config: &SimConfig, file: &Path, out: Option<PathBuf>) -> Result<()> {
    let snapshots = load_snapshots(file)?;
    println!(
        "Evolving over {} snapshot(s): population {}, generations {}, {} ticks per evaluation",
        snapshots.len(),
        config.evolve.population_size,
        config.evolve.generations,
        config.evolve.ticks_per_eval
    );

    let result = evolve(config, &snapshots)?;
    let out = out.unwrap_or_else(|| config.output.output_dir.join("evolution_results.csv"));
    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    std::fs::write(&out, export_evolution_csv(&result.rows)?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    let series = out.with_file_name("evolution_generations.csv");
    std::fs::write(&series, export_generation_csv(&result.generations)?)
        .with_context(|| format!("failed to write {}", series.display()))?;

    println!();
    println!("=== Fitness by Generation ===");
    println!("{:>10}  {:>12}  {:>12}  {:>10}", "Generation", "Mean ROE", "Max ROE", "Threshold");
    for g in &result.generations {
        println!(
            "{:>10}  {:>11.4}%  {:>11.4}%  {:>10.4}",
            g.generation,
            g.mean_fitness * 100.0,
            g.max_fitness * 100.0,
            g.best_threshold
        );
    }

    println!();
    println!("=== Evolution Result ===");
    println!("Best threshold: {:.4}", result.best.threshold);
    println!("Best fitness:   {:.6}", result.best.fitness);
    println!("Found in:       generation {}, gene {}", result.best.generation, result.best.gene);
    println!("Results saved to: {}", out.display());
    println!("  {}", series.display());
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    let config = SimConfig::default();
    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    println!("Config ID: {}", config.config_id());
    Ok(())
}

/// Request a stop when a line reading `q` arrives on stdin.
fn spawn_quit_listener(stop: StopHandle) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    stop.request_stop();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}

fn sleep_unless_stopped(stop: &StopHandle, total: Duration) {
    const SLICE: Duration = Duration::from_millis(100);
    let mut left = total;
    while !left.is_zero() && !stop.is_stop_requested() {
        let step = left.min(SLICE);
        std::thread::sleep(step);
        left -= step;
    }
}

fn print_summary(report: &SessionReport) -> Result<()> {
    let s = &report.summary;
    println!();
    println!("=== Session Result ===");
    println!("Ticks:          {}", report.ticks);
    println!("Trades:         {} ({} won, {} lost)", s.trade_count, s.wins, s.losses);
    println!("Win Rate:       {:.1}%", s.win_rate * 100.0);
    println!();
    println!("--- Performance ---");
    println!("Starting Cash:  ${:.2}", s.initial_cash);
    println!("Final Cash:     ${:.2}", s.final_cash);
    println!("Net P/L:        ${:+.2}", s.total_net_pnl);
    println!("Fees:           ${:.2}", s.total_fees);
    println!("Funding:        ${:.4}", s.total_funding);
    println!("Return on Cap:  {:.2}%", s.return_on_capital * 100.0);
    println!("Profit Factor:  {:.2}", s.profit_factor);
    println!(
        "Exits:          {}",
        serde_json::to_string(&s.exits_by_reason).context("failed to format exit counts")?
    );
    println!("History Digest: {}", s.history_digest);
    if s.open_positions > 0 {
        println!();
        println!("WARNING: {} position(s) still open", s.open_positions);
    }
    println!();
    Ok(())
}
