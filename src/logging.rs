//! File-based logging
//!
//! The TUI owns the terminal, so tracing output goes to a daily rolling file
//! in the configured log directory.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_PREFIX: &str = "blade";

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "blade=debug,librespot=info,rspotify=info,symphonia=warn,warn";

/// Initialize the logging system.
///
/// Logs are written to `<log_dir>/blade.YYYY-MM-DD.log` with daily rotation.
/// The log level can be controlled via the `RUST_LOG` environment variable.
pub fn init_logging(log_dir: &Path) -> anyhow::Result<()> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

    // Non-blocking so decoder and audio threads never wait on disk
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes on drop; it has to live as long as the process
    Box::leak(Box::new(guard));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs written to {}/", log_dir.display());

    Ok(())
}
