//! Probe client for the virtual device register contract.

/// Probe client and hosted-session runner.
pub mod probe;
/// Script parsing for scripted probe runs.
pub mod script;
/// Stderr backend for the `log` facade.
pub mod logger;

pub use probe::{with_hosted_probe, Probe, ProbeError};
pub use script::{parse_script, parse_word, ScriptError, ScriptStep};

#[cfg(test)]
use tempfile as _;
