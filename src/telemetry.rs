use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::Registry;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Where and how verbosely the core logs.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"flockflow=debug"`.
    pub log_level: String,
    /// When set, JSON logs are also written to a daily-rolling file in
    /// this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

/// Install the global tracing subscriber: env-filtered stderr output plus
/// an optional newline-delimited JSON rolling file.
///
/// Returns the appender guard; drop it only on shutdown or buffered log
/// lines are lost.
pub fn init(config: &TelemetryConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_ansi(false);

    match &config.log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "flockflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let json_layer = fmt::layer().json().with_writer(writer).with_target(true);
            Registry::default()
                .with(env_filter)
                .with(stderr_layer)
                .with(json_layer)
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            Registry::default()
                .with(env_filter)
                .with(stderr_layer)
                .try_init()?;
            Ok(None)
        }
    }
}
