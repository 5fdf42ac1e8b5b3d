//! Integration tests for the vdev-probe CLI.

use device_core as _;
use device_probe as _;
use env_logger as _;
use log as _;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use thiserror as _;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("vdev-probe")
}

/// Binary command with log filtering driven only by its own flags.
fn vdev_probe() -> Command {
    let mut command = Command::new(binary_path());
    command.env_remove("RUST_LOG");
    command
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn probe_prints_reference_sequence() {
    let output = vdev_probe()
        .args(["probe", "-q"])
        .output()
        .expect("failed to run vdev-probe");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "=== Reading initial status ===\n\
         Status: 0x00000001\n\
         \n\
         === Enabling device ===\n\
         === Reading status after enable ===\n\
         Status: 0x00000002\n\
         \n\
         === Resetting device ===\n\
         === Reading status after reset ===\n\
         Status: 0x00000001\n\
         \n"
    );
}

#[test]
fn run_replays_script_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let script = create_temp_file(
        temp_dir.path(),
        "bring_up.txt",
        "# power-on\nread\nENABLE\nENABLE|RESET\n0x80000001\n",
    );

    let output = vdev_probe()
        .args(["run", script.to_str().unwrap(), "-q"])
        .output()
        .expect("failed to run vdev-probe");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "Status: 0x00000001\n\
         === Writing 0x00000001 ===\n\
         Status: 0x00000002\n\
         === Writing 0x00000003 ===\n\
         Status: 0x00000001\n\
         === Writing 0x80000001 ===\n\
         Status: 0x00000002\n"
    );
}

#[test]
fn run_reports_script_parse_errors() {
    let temp_dir = tempfile::tempdir().unwrap();
    let script = create_temp_file(temp_dir.path(), "bad.txt", "read\nstart\n");

    let output = vdev_probe()
        .args(["run", script.to_str().unwrap()])
        .output()
        .expect("failed to run vdev-probe");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("line 2"));
    assert!(stderr.contains("start"));
}

#[test]
fn run_reports_missing_script() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("missing.txt");

    let output = vdev_probe()
        .args(["run", missing.to_str().unwrap()])
        .output()
        .expect("failed to run vdev-probe");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("failed to read"));
}

#[test]
fn invalid_node_name_fails_bring_up() {
    let output = vdev_probe()
        .args(["probe", "--node", "dev/zero"])
        .output()
        .expect("failed to run vdev-probe");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("invalid device configuration"));
}

#[test]
fn verbose_run_logs_to_stderr() {
    let output = vdev_probe()
        .args(["probe", "-v", "-v", "-v"])
        .output()
        .expect("failed to run vdev-probe");

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("device node up"));
    assert!(stderr.contains("control <="));
}

#[test]
fn help_flag_prints_usage() {
    let output = vdev_probe()
        .arg("--help")
        .output()
        .expect("failed to run vdev-probe");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Usage: vdev-probe"));
}
