//! Snapshot sources — where each tick's market data comes from.
//!
//! The session pulls one snapshot per tick and never looks behind this trait,
//! so a live exchange feed and a recorded file drive identical code paths.

pub mod kraken;
pub mod replay;

pub use kraken::KrakenTickerSource;
pub use replay::{load_snapshots, ReplaySource, SnapshotRecorder};

use std::path::PathBuf;

use perpsim_core::domain::MarketSnapshot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response format: {0}")]
    Format(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: invalid snapshot: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A pull-based stream of market snapshots.
pub trait SnapshotSource: Send {
    /// Human-readable name (e.g., "kraken_futures").
    fn name(&self) -> &str;

    /// Next snapshot, `Ok(None)` at end of stream.
    ///
    /// An `Err` is a transient failure; the caller may retry.
    fn next_snapshot(&mut self) -> Result<Option<MarketSnapshot>, SourceError>;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_snapshot(&mut self) -> Result<Option<MarketSnapshot>, SourceError> {
        (**self).next_snapshot()
    }
}
