//! Tracing setup shared by the `vidqc` binaries and tests.
//!
//! Mirrors the dual console/file layered subscriber used across the
//! analysis core: a compact, ANSI-aware console layer for interactive use
//! and a plain, rotated file layer for durable logs. Both layers carry
//! their own [`EnvFilter`], so `RUST_LOG` can tune console and file
//! verbosity independently.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

static WORKER_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

pub const DEFAULT_CONSOLE_LEVEL: LevelFilter = LevelFilter::INFO;
pub const DEFAULT_FILE_LEVEL: LevelFilter = LevelFilter::DEBUG;

/// Initialize the global tracing subscriber.
///
/// `log_path` names the rotated log file; when its parent is empty the
/// file rotates daily under `logs/`, otherwise it is written once, never
/// rotated, at the given path. Calling this more than once per process
/// panics (matches `tracing`'s own global-default contract); tests that
/// need logging should use [`try_init`] instead.
pub fn init(console_level: LevelFilter, file_level: LevelFilter, log_path: impl AsRef<Path>) {
    try_init(console_level, file_level, log_path).expect("failed to install tracing subscriber");
}

/// Fallible variant of [`init`], safe to call from tests that may race
/// each other for the global subscriber.
pub fn try_init(
    console_level: LevelFilter,
    file_level: LevelFilter,
    log_path: impl AsRef<Path>,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let log_path = log_path.as_ref();

    let console_filter = env_filter_or(console_level);
    let file_filter = env_filter_or(file_level);

    let file_appender = file_appender_for(log_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Best-effort: a second init in the same process keeps the first guard.
    let _ = WORKER_GUARD.set(guard);

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(non_blocking)
                .with_filter(file_filter),
        )
        .with(
            fmt::layer()
                .compact()
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false)
                .with_file(false)
                .without_time()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        );

    tracing::subscriber::set_global_default(subscriber)?;
    tracing::debug!("logging initialized (console={console_level}, file={file_level})");
    Ok(())
}

fn env_filter_or(default_level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()))
}

fn file_appender_for(log_path: &Path) -> RollingFileAppender {
    let parent = log_path.parent().filter(|p| !p.as_os_str().is_empty());
    let file_name = log_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("vidqc.log"));

    match parent {
        None => RollingFileAppender::new(Rotation::DAILY, "logs", file_name),
        Some(dir) => RollingFileAppender::new(Rotation::NEVER, Path::new("logs").join(dir), file_name),
    }
}
