//! Recorded snapshots — JSON-lines replay and recording.
//!
//! One [`MarketSnapshot`] per line. Blank lines are ignored; a malformed line
//! fails the whole load with its line number, since a replay with silently
//! missing ticks is not the replay that was recorded.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use perpsim_core::domain::MarketSnapshot;

use super::{SnapshotSource, SourceError};

/// Read every snapshot from a JSONL file.
pub fn load_snapshots(path: &Path) -> Result<Vec<MarketSnapshot>, SourceError> {
    let io_err = |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::open(path).map_err(io_err)?;
    let mut snapshots = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let snapshot = serde_json::from_str(&line).map_err(|source| SourceError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}

/// Plays back a fixed sequence of snapshots, then ends.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    name: String,
    remaining: VecDeque<MarketSnapshot>,
}

impl ReplaySource {
    pub fn from_snapshots(snapshots: Vec<MarketSnapshot>) -> Self {
        Self {
            name: "replay".to_string(),
            remaining: snapshots.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let snapshots = load_snapshots(path)?;
        Ok(Self {
            name: format!("replay:{}", path.display()),
            remaining: snapshots.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl SnapshotSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_snapshot(&mut self) -> Result<Option<MarketSnapshot>, SourceError> {
        Ok(self.remaining.pop_front())
    }
}

/// Appends snapshots to a JSONL file for later replay.
pub struct SnapshotRecorder {
    path: PathBuf,
}

impl SnapshotRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, snapshot: &MarketSnapshot) -> std::io::Result<()> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use perpsim_core::domain::Ticker;

    fn snaps(n: i64) -> Vec<MarketSnapshot> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                MarketSnapshot::new(start + Duration::seconds(3 * i))
                    .with_ticker("PF_XBTUSD", Ticker::with_mark(100.0 + i as f64))
            })
            .collect()
    }

    #[test]
    fn in_memory_replay_ends() {
        let mut src = ReplaySource::from_snapshots(snaps(2));
        assert_eq!(src.remaining(), 2);
        assert!(src.next_snapshot().unwrap().is_some());
        assert!(src.next_snapshot().unwrap().is_some());
        assert!(src.next_snapshot().unwrap().is_none());
    }

    #[test]
    fn record_then_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/ticks.jsonl");
        let recorder = SnapshotRecorder::new(&path);
        let original = snaps(3);
        for s in &original {
            recorder.append(s).unwrap();
        }
        assert_eq!(load_snapshots(&path).unwrap(), original);

        let mut src = ReplaySource::from_path(&path).unwrap();
        assert!(src.name().starts_with("replay:"));
        assert_eq!(src.next_snapshot().unwrap(), Some(original[0].clone()));
    }

    #[test]
    fn blank_lines_skipped_bad_lines_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticks.jsonl");
        let good = serde_json::to_string(&snaps(1)[0]).unwrap();
        fs::write(&path, format!("{good}\n\n{good}\n")).unwrap();
        assert_eq!(load_snapshots(&path).unwrap().len(), 2);

        fs::write(&path, format!("{good}\n{{oops\n")).unwrap();
        match load_snapshots(&path) {
            Err(SourceError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_snapshots(Path::new("/nonexistent/ticks.jsonl")),
            Err(SourceError::Io { .. })
        ));
    }
}
