use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "DNSPILOT_LOG";

/// Output destination for tracing
pub enum TracingOutput {
    /// Human-facing runs. Stdout is reserved for command output.
    Stderr,
    /// Append to a log file
    File(PathBuf),
}

/// Filter used when `DNSPILOT_LOG` is unset. Audit events are always kept.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("dnspilot={level},audit=info")
}

/// Initialize tracing based on configuration
/// Priority: DNSPILOT_LOG env > verbose flag > default (info)
pub fn init_tracing(verbose: bool, output: TracingOutput) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    match output {
        TracingOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(io::stderr))
                .init();
        }
        TracingOutput::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let file = OpenOptions::new().create(true).append(true).open(&path)?;

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(file),
                )
                .init();
        }
    }
    Ok(())
}
