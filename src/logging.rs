//! Tracing subscriber setup for the CLI.
//!
//! Filter resolution: `CONDUCTOR_LOG`, then `RUST_LOG`, then a default that
//! depends on `--verbose`. Logs go to stderr so that stdout stays free for
//! the progress UI and report output. With `--log-dir`, a daily-rolling JSON
//! log file is written as well.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "CONDUCTOR_LOG";
pub const LOG_FILE_PREFIX: &str = "conductor.log";

/// Stderr log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
}

/// Directive used when neither env variable is set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,conductor=debug"
    } else {
        "warn,conductor=info"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and closes the log file.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let text = (options.format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let json = (options.format == LogFormat::Json)
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    let (file, guard) = match &options.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(options.verbose))
        .with(text)
        .with(json)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
