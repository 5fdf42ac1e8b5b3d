//! Probe script format.
//!
//! One step per line. `read` reports the status register; anything else is a
//! command word written to the control register. Words are hex (`0x..`),
//! binary (`0b..`), decimal, or `|`-joined command names (`ENABLE|RESET`).
//! `#` starts a comment.

use device_core::ControlFlags;
use thiserror::Error;

/// One scripted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// Read and report the status register.
    Read,
    /// Write a command word, then report the resulting status.
    Write(u32),
}

/// Script parse failure with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: invalid command word {token:?}")]
pub struct ScriptError {
    /// 1-based line number.
    pub line: usize,
    /// Offending token.
    pub token: String,
}

/// Parses a whole script.
///
/// # Errors
///
/// Returns [`ScriptError`] for the first line that is neither `read` nor a
/// valid command word.
pub fn parse_script(source: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    let mut steps = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("read") {
            steps.push(ScriptStep::Read);
            continue;
        }
        let word = parse_word(line).ok_or_else(|| ScriptError {
            line: idx + 1,
            token: line.to_string(),
        })?;
        steps.push(ScriptStep::Write(word));
    }
    Ok(steps)
}

/// Parses one command word.
#[must_use]
pub fn parse_word(text: &str) -> Option<u32> {
    text.split('|')
        .map(str::trim)
        .try_fold(0_u32, |acc, part| parse_term(part).map(|bits| acc | bits))
}

fn parse_term(term: &str) -> Option<u32> {
    if let Some(hex) = term.strip_prefix("0x").or_else(|| term.strip_prefix("0X")) {
        return u32::from_str_radix(&hex.replace('_', ""), 16).ok();
    }
    if let Some(bin) = term.strip_prefix("0b").or_else(|| term.strip_prefix("0B")) {
        return u32::from_str_radix(&bin.replace('_', ""), 2).ok();
    }
    if term.starts_with(|c: char| c.is_ascii_digit()) {
        return term.replace('_', "").parse().ok();
    }
    ControlFlags::from_name(&term.to_ascii_uppercase()).map(|flag| flag.bits())
}
