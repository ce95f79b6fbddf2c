use std::fs::OpenOptions;
use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How the process is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// MCP stdio server: stdout/stderr belong to the protocol, so only the
    /// optional log file is written
    Serve,
    /// Offline dataset commands: stderr, plus the log file when given
    Batch,
}

/// Install the global subscriber for `mode`.
///
/// Verbosity comes from `RUST_LOG` and defaults to `info`. In serve mode
/// without a log file nothing is installed at all.
pub fn init_logging(mode: LogMode, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let console = match mode {
        LogMode::Batch => Some(fmt::layer().with_writer(std::io::stderr)),
        LogMode::Serve => None,
    };

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_writer(file).with_ansi(false))
        }
        None => None,
    };

    if console.is_none() && file.is_none() {
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}
