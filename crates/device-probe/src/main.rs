//! CLI entry point for the virtual device probe.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use device_core::DeviceConfig;
use device_probe::logger;
use device_probe::{parse_script, with_hosted_probe, ProbeError};
use env_logger as _;
use log as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;

const USAGE_TEXT: &str = "\
Usage: vdev-probe <command> [options]

Commands:
  probe                 Read, enable, read, reset, read
  run <script>          Replay command words from a script file

Options:
  -n, --node <name>     Device node name (default: virtual_device)
  -v, --verbose         Increase log verbosity (repeatable)
  -q, --quiet           Disable logging
  -h, --help            Show this help message

Script lines:
  read                  Report the status register
  0x1 | 2 | ENABLE      Write a command word, then report status
  # ...                 Comment

Examples:
  vdev-probe probe
  vdev-probe run bring_up.txt -v
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Probe(CommonArgs),
    Run(RunArgs),
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CommonArgs {
    node: Option<String>,
    verbose: u8,
    quiet: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    script: PathBuf,
    common: CommonArgs,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "probe" => parse_options(args).and_then(|(common, positional)| {
            if let Some(extra) = positional.first() {
                return Err(format!("unexpected argument: {}", extra.display()));
            }
            Ok(ParseResult::Command(Command::Probe(common)))
        }),
        "run" => parse_options(args).and_then(|(common, positional)| {
            let mut positional = positional.into_iter();
            let script = positional
                .next()
                .ok_or_else(|| "missing script path".to_string())?;
            if positional.next().is_some() {
                return Err("multiple script paths provided".to_string());
            }
            Ok(ParseResult::Command(Command::Run(RunArgs { script, common })))
        }),
        other => Err(format!("unknown command: {other}")),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_options(
    mut args: impl Iterator<Item = OsString>,
) -> Result<(CommonArgs, Vec<PathBuf>), String> {
    let mut common = CommonArgs::default();
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            common.verbose = common.verbose.saturating_add(1);
            continue;
        }

        if arg == "--quiet" || arg == "-q" {
            common.quiet = true;
            continue;
        }

        if arg == "-n" || arg == "--node" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --node".to_string())?;
            common.node = Some(value.to_string_lossy().to_string());
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        positional.push(PathBuf::from(arg));
    }

    Ok((common, positional))
}

fn device_config(common: &CommonArgs) -> DeviceConfig {
    match &common.node {
        Some(node) => DeviceConfig::default().with_node_name(node.clone()),
        None => DeviceConfig::default(),
    }
}

fn install_logger(common: &CommonArgs) {
    if let Err(e) = logger::init(logger::level_for(common.verbose, common.quiet)) {
        eprintln!("warning: logger unavailable: {e}");
    }
}

fn run_probe(common: &CommonArgs) -> Result<(), ProbeError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    with_hosted_probe(device_config(common), |probe| {
        probe.run_smoke(&mut out).map(|_| ())
    })?;
    out.flush()?;
    Ok(())
}

fn run_script(args: &RunArgs) -> Result<(), ProbeError> {
    let source = fs::read_to_string(&args.script).map_err(|source| ProbeError::ReadScript {
        path: args.script.clone(),
        source,
    })?;
    let steps = parse_script(&source)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    with_hosted_probe(device_config(&args.common), |probe| {
        probe.run_script(&steps, &mut out)
    })?;
    out.flush()?;
    Ok(())
}

fn report(result: Result<(), ProbeError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Probe(common))) => {
            install_logger(&common);
            report(run_probe(&common))
        }
        Ok(ParseResult::Command(Command::Run(args))) => {
            install_logger(&args.common);
            report(run_script(&args))
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
