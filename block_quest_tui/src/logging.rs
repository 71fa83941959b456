//! Tracing setup.
//!
//! Reads `RUST_LOG`, defaulting to `warn`. Headless runs log to stderr. The
//! TUI owns the terminal, so it only logs when given a file.

use std::{fs::File, path::PathBuf, sync::Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub enum LogTarget {
    Stderr,
    File(PathBuf),
    Off,
}

pub fn init(target: LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match target {
        LogTarget::Off => {}
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).compact())
                .init();
        }
        LogTarget::File(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .compact(),
                )
                .init();
        }
    }
    Ok(())
}
