//! Tracing setup: stderr console layer plus a non-blocking file layer.

use std::fs::{self, OpenOptions};
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,perpsim_core=info,perpsim_runner=info";
const LOG_FILE: &str = "simulation.log";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
///
/// File logging is skipped, with a warning on stderr, when `log_dir` cannot
/// be created or written. Otherwise the returned guard must be held until
/// exit; dropping it flushes `simulation.log`.
pub fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match open_log_writer(log_dir) {
        Ok((writer, guard)) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: could not write to log directory {} ({e}), file logging disabled",
                log_dir.display()
            );
            (None, None)
        }
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    guard
}

/// Non-blocking writer appending to `<dir>/simulation.log`.
fn open_log_writer(dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    // The appender panics if it cannot open its first file, so probe first.
    fs::create_dir_all(dir)?;
    let probe = dir.join(".perpsim_write_test");
    OpenOptions::new().create(true).append(true).open(&probe)?;
    let _ = fs::remove_file(&probe);

    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_guard_flushes_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, guard) = open_log_writer(dir.path()).unwrap();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("closed position");
            tracing::info!("session finished");
        });
        drop(guard);

        let log = fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert!(log.contains("closed position"), "log was: {log:?}");
        assert!(log.contains("session finished"), "log was: {log:?}");
    }

    #[test]
    fn unwritable_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();
        assert!(open_log_writer(&blocker.join("logs")).is_err());
    }
}
