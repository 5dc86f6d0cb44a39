//! CLI integration tests

use std::process::Command;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "kubetop", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("resource usage dashboard"),
        "Should show description"
    );
    assert!(stdout.contains("--interval"), "Should show interval flag");
    assert!(stdout.contains("--iterations"), "Should show iterations flag");
    assert!(stdout.contains("--context"), "Should show context flag");
    assert!(stdout.contains("--namespace"), "Should show namespace flag");
    assert!(stdout.contains("--pipeline"), "Should show pipeline flag");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "kubetop", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("kubetop"), "Should show binary name");
}

/// Test that a zero interval is refused before touching the cluster
#[test]
fn test_zero_interval_fails() {
    let output = Command::new("cargo")
        .args(["run", "-p", "kubetop", "--", "--interval", "0"])
        .env_remove("KUBETOP_INTERVAL_SECS")
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Zero interval should fail");
    assert!(
        stderr.contains("at least one second"),
        "Should explain the failure"
    );
}

/// Test that an unknown flag is rejected
#[test]
fn test_unknown_flag_fails() {
    let output = Command::new("cargo")
        .args(["run", "-p", "kubetop", "--", "--refresh-rate", "5"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Unknown flag should fail");
}
