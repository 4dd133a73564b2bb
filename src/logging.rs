/// File-backed tracing setup.
///
/// The TUI owns stdout/stderr through the alternate screen, so log records go
/// to `<data_dir>/codesplice.log`. Filter with `CODESPLICE_LOG` (env-filter
/// syntax, default `info`).
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "codesplice.log";
const FILTER_ENV: &str = "CODESPLICE_LOG";

/// Install the global subscriber. Keep the returned guard alive until exit or
/// buffered records are lost.
pub fn init(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(guard)
}
