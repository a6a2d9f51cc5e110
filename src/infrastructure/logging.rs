//! Centralized file-based logging system
//!
//! Writes logs under the configured directory, one rolling file per sink:
//! - `main/`   - every event, JSON
//! - `error/`  - WARN and above
//! - `broker/` - events with target `broker` (produce failures, topic routing)
//! - `http/`   - events with target `http` (request access log)

use crate::infrastructure::config::LogConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

const SINKS: [&str; 4] = ["main", "error", "broker", "http"];

/// Flush guards of the file sinks
///
/// Dropping a guard flushes and closes its writer. Keep the value alive for
/// the lifetime of the process and call `close` on the way out.
pub struct LogSinks {
    main: WorkerGuard,
    error: WorkerGuard,
    broker: WorkerGuard,
    http: WorkerGuard,
}

impl LogSinks {
    /// Flush the protocol sinks, then the general ones
    pub fn close(self) {
        let LogSinks {
            main,
            error,
            broker,
            http,
        } = self;
        drop(broker);
        drop(http);
        drop(error);
        drop(main);
    }
}

/// Initialize file and console logging
///
/// `RUST_LOG` overrides the configured level when set.
///
/// # Errors
/// Returns error if the log directories cannot be created.
pub fn init_logging(config: &LogConfig) -> io::Result<LogSinks> {
    create_sink_dirs(&config.dir)?;

    let (main_appender, main) = create_appender(&config.dir, "main");
    let (error_appender, error) = create_appender(&config.dir, "error");
    let (broker_appender, broker) = create_appender(&config.dir, "broker");
    let (http_appender, http) = create_appender(&config.dir, "http");

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(LevelFilter::WARN);

    let broker_layer = tracing_subscriber::fmt::layer()
        .with_writer(broker_appender)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_filter(filter_fn(|metadata| metadata.target() == "broker"));

    let http_layer = tracing_subscriber::fmt::layer()
        .with_writer(http_appender)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_filter(filter_fn(|metadata| metadata.target() == "http"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(broker_layer)
        .with(http_layer)
        .with(console_layer)
        .init();

    tracing::info!(dir = %config.dir.display(), "Logging system initialized");

    Ok(LogSinks {
        main,
        error,
        broker,
        http,
    })
}

fn create_sink_dirs(root: &Path) -> io::Result<()> {
    for sink in SINKS {
        fs::create_dir_all(root.join(sink))?;
    }
    Ok(())
}

/// Create a daily rolling non-blocking appender
fn create_appender(root: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, root.join(name), name);
    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific sinks
#[macro_export]
macro_rules! log_http {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "http", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_broker {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "broker", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_directory_creation() {
        let root = std::env::temp_dir().join(format!("gateway-logs-{}", std::process::id()));
        fs::remove_dir_all(&root).ok();

        create_sink_dirs(&root).unwrap();
        for sink in SINKS {
            assert!(root.join(sink).is_dir());
        }
        // Idempotent
        create_sink_dirs(&root).unwrap();

        fs::remove_dir_all(&root).ok();
    }
}
