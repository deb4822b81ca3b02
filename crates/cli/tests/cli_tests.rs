//! CLI integration tests

use std::process::Command;

fn pmeter(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "meter-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = pmeter(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Power Meter"), "Should show app name");
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("summary"), "Should show summary command");
    assert!(stdout.contains("alerts"), "Should show alerts command");
    assert!(stdout.contains("export"), "Should show export command");
    assert!(stdout.contains("send"), "Should show send command");
    assert!(stdout.contains("reset"), "Should show reset command");
    assert!(stdout.contains("simulate"), "Should show simulate command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = pmeter(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("pmeter"), "Should show binary name");
}

/// Test summary subcommand help
#[test]
fn test_summary_help() {
    let output = pmeter(&["summary", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Summary help should succeed");
    assert!(
        stdout.contains("--cost-per-kwh"),
        "Should show tariff option"
    );
}

/// Test send subcommand requires a power value
#[test]
fn test_send_requires_power() {
    let output = pmeter(&["send"]);

    assert!(!output.status.success(), "Send without --power should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--power"), "Should mention missing option");
}

/// Test invalid output format is rejected
#[test]
fn test_invalid_format() {
    let output = pmeter(&["--format", "xml", "status"]);

    assert!(!output.status.success(), "Invalid format should fail");
}

/// Test offline simulation with JSON output
#[test]
fn test_simulate_json() {
    let output = pmeter(&[
        "--format", "json", "simulate", "--count", "30", "--seed", "42",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Simulate should succeed");
    assert!(
        stdout.contains("\"samples_ingested\": 30"),
        "Should report every sample"
    );
    assert!(
        stdout.contains("\"detector_state\": \"active\""),
        "Detector should be active after 30 samples"
    );
}

/// Test offline simulation writes a CSV export
#[test]
fn test_simulate_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sim.csv");
    let path_str = path.to_string_lossy().to_string();

    let output = pmeter(&[
        "simulate", "--count", "10", "--seed", "1", "--output", &path_str,
    ]);

    assert!(output.status.success(), "Simulate should succeed");
    let csv = std::fs::read_to_string(&path).unwrap();
    assert!(csv.starts_with("Time,Device_ID,Voltage,Current,Power,Is_Anomaly"));
    assert_eq!(csv.lines().count(), 11);
}

/// Test remote commands fail cleanly when no agent is listening
#[test]
fn test_status_without_agent() {
    let output = pmeter(&["--api-url", "http://127.0.0.1:9", "status"]);

    assert!(!output.status.success(), "Status should fail without an agent");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to send request"),
        "Should explain the connection failure"
    );
}
