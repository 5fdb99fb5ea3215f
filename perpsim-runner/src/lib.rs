//! PerpSim Runner — session driver, snapshot sources, configuration, reporting.
//!
//! This crate builds on `perpsim-core` to provide:
//! - TOML configuration with validation, content hashing and hot reload
//! - Snapshot sources (Kraken Futures tickers, JSONL replay) and recording
//! - The tick loop with retry, stop handling and session-end liquidation
//! - Session metrics and CSV/JSON export
//! - Genetic search over the momentum threshold

pub mod config;
pub mod evolve;
pub mod export;
pub mod metrics;
pub mod session;
pub mod source;

pub use config::{ConfigError, ConfigId, ConfigReloader, OutputSettings, SessionSettings, SimConfig};
pub use evolve::{evolve, EvolutionResult, EvolveConfig, EvolveError, GeneResult, GenerationStats};
pub use export::{write_artifacts, ArtifactPaths, SessionReport};
pub use metrics::SessionSummary;
pub use session::{
    run_tick, NoopObserver, Session, SessionEnd, SessionError, SessionOutcome, StopHandle,
    TickObserver, TickOutcome, TickUpdate,
};
pub use source::{
    KrakenTickerSource, ReplaySource, SnapshotRecorder, SnapshotSource, SourceError,
};
