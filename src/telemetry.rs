//! Tracing initialisation for the `crewloop` binary.
//!
//! Logs go to a daily-rolling file under `.crewloop/logs/` so they never
//! interleave with the conversation on the terminal. `--verbose` also mirrors
//! them to stderr. `RUST_LOG` overrides the default filter.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

pub const LOG_FILE_PREFIX: &str = "crewloop.log";

/// Keeps the background log writer alive. Drop it last.
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "crewloop=debug" } else { "crewloop=info" }
}

/// Install the global subscriber. Only the first call takes effect.
///
/// * `log_dir` - where the log file goes; `None` disables file logging
/// * `json` - newline-delimited JSON instead of plain text
/// * `verbose` - debug level, mirrored to stderr
pub fn init_tracing(log_dir: Option<&Path>, json: bool, verbose: bool) -> TelemetryGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut guard = None;

    if let Some(dir) = log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(file_guard);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        layers.push(if json { layer.json().boxed() } else { layer.boxed() });
    }

    // No file to write to: stderr is the only place left.
    if verbose || guard.is_none() {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        layers.push(if json { layer.json().boxed() } else { layer.boxed() });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .ok();

    TelemetryGuard { _file: guard }
}
