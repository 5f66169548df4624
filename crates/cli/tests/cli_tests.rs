//! CLI integration tests

use std::process::Command;

fn kusage(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "usage-cli", "--"])
        .args(args)
        .env_remove("KUSAGE_PROMETHEUS_ENDPOINT")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = kusage(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Cluster resource usage from Prometheus"),
        "Should show about text"
    );
    assert!(stdout.contains("discover"), "Should show discover command");
    assert!(stdout.contains("pods"), "Should show pods command");
    assert!(stdout.contains("nodes"), "Should show nodes command");
    assert!(stdout.contains("snapshot"), "Should show snapshot command");
    assert!(
        stdout.contains("--prometheus-endpoint"),
        "Should show endpoint option"
    );
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = kusage(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("kusage"), "Should show binary name");
}

/// Test pods subcommand help
#[test]
fn test_pods_help() {
    let output = kusage(&["pods", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Pods help should succeed");
    assert!(
        stdout.contains("--namespace"),
        "Should show namespace option"
    );
    assert!(stdout.contains("--format"), "Should show global format option");
}

/// Test that an unknown output format is rejected
#[test]
fn test_invalid_format() {
    let output = kusage(&["--format", "yaml", "nodes"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unknown format should fail");
    assert!(stderr.contains("yaml"), "Should name the rejected value");
}

/// Test that a malformed endpoint fails before any network access
#[test]
fn test_invalid_endpoint() {
    let output = kusage(&["--prometheus-endpoint", "monitoring/prometheus", "snapshot"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Malformed endpoint should fail");
    assert!(
        stderr.contains("monitoring/prometheus"),
        "Should echo the endpoint"
    );
}

/// Test that an unreachable direct endpoint is reported as an error
#[test]
fn test_unreachable_direct_endpoint() {
    let output = kusage(&[
        "--prometheus-endpoint",
        "http://127.0.0.1:1",
        "--timeout",
        "2",
        "nodes",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unreachable backend should fail");
    assert!(stderr.contains("querying"), "Should name the failing query");
}
