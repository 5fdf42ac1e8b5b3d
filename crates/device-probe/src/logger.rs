//! Logging setup for the probe binary.

use env_logger::{Builder, Target};
use log::{LevelFilter, SetLoggerError};

/// Installs an stderr logger at `level`.
///
/// `RUST_LOG` still applies on top, so per-module filters can be added at
/// run time.
///
/// # Errors
///
/// Returns [`SetLoggerError`] when another logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .target(Target::Stderr)
        .try_init()
}

/// Maps `-v`/`-q` counts to a level filter; warnings are the default.
#[must_use]
pub const fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Off;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
