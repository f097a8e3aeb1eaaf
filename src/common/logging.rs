//! Logging initialization. Logs go to both the console and a rolling log
//! file, filtered by `RUST_LOG` (or an explicit `--log-level` override).

use crate::common::consts;
use crate::common::error;
use chrono::Local;
use std::fs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Sets up the global tracing subscriber.
///
/// `log_dir` is where rolling log files are written; `level_override` takes
/// precedence over `RUST_LOG`, which takes precedence over
/// [`consts::LOG_DEFAULT_LEVEL`].
pub fn logging_init(log_dir: &str, level_override: Option<&str>) -> error::Result<()> {
    let log_file = format!(
        "{}_{}.log",
        Local::now().format(consts::LOG_TIME_FORMAT),
        consts::LOG_BASE_NAME
    );

    let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, log_file);
    fs::create_dir_all(log_dir)?;

    let file_layer = fmt::Layer::default()
        .with_writer(file_appender)
        .with_line_number(true)
        .with_ansi(false);

    let stdout_layer = fmt::Layer::default()
        .with_writer(std::io::stdout)
        .with_line_number(true);

    let rust_log = level_override
        .map(str::to_string)
        .or_else(|| std::env::var(consts::LOG_KEY_ENV).ok())
        .unwrap_or_else(|| consts::LOG_DEFAULT_LEVEL.to_string());

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(rust_log))
        .with(stdout_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Opens the per-process span every log line from a service should live
/// inside, so `service=<name>` is attached to every event without each call
/// site repeating it (spec.md §7's "structured logs" contract requires a
/// `service` field).
pub fn service_span(service: &str) -> tracing::Span {
    tracing::info_span!("service", service = %service)
}
