//! Logging setup shared by binaries built on the connector.

use crate::{Result, error::ConnectorError};
use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Maps command-line verbosity to a default log level.
///
/// `quiet` wins over any verbosity; otherwise 0 is INFO, 1 is DEBUG and
/// anything higher is TRACE.
pub const fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Initializes structured logging to stderr.
///
/// `RUST_LOG` directives refine the level chosen by [`level_for`], e.g.
/// `RUST_LOG=sqlconnector_core=trace,tiberius=warn`.
///
/// # Errors
/// Returns a `Configuration` error if a global subscriber is already set.
///
/// # Example
/// ```rust,no_run
/// use sqlconnector_core::logging::init_logging;
///
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level_for(verbose, quiet)).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            ConnectorError::configuration(format!("Failed to initialize logging: {}", e))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // A global subscriber can only be installed once per test process, so
    // only the level mapping is covered here.
    #[test]
    fn test_verbosity_levels() {
        let cases = [
            ((0, true), Level::ERROR),
            ((5, true), Level::ERROR),
            ((0, false), Level::INFO),
            ((1, false), Level::DEBUG),
            ((2, false), Level::TRACE),
            ((10, false), Level::TRACE),
        ];

        for ((verbose, quiet), expected) in cases {
            assert_eq!(
                level_for(verbose, quiet),
                expected,
                "verbose={verbose}, quiet={quiet}"
            );
        }
    }
}
