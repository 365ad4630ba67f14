//! Smoke tests for payonphone-demo-cli
//!
//! These run the binary against the simulated reader fleet with a local
//! credential, so no backend is needed.

use std::process::Command;

fn demo(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "payonphone-demo-cli", "--"])
        .args(args)
        .env_remove("PAYONPHONE_BACKEND_URL")
        .env_remove("PAYONPHONE_CURRENCY")
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI can show help
#[test]
fn test_cli_help() {
    let output = demo(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        eprintln!("stdout: {}", stdout);
        eprintln!("stderr: {}", stderr);
    }

    for command in ["health", "token", "discover", "charge"] {
        assert!(
            stdout.contains(command),
            "Help should mention '{}' command",
            command
        );
    }
}

/// Test that an offline discovery lists the simulated readers
#[test]
fn test_cli_discover_offline() {
    let output = demo(&["discover", "--offline"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "discover failed: {}", stdout);
    assert!(stdout.contains("STRM26138003393"));
}

/// Test an offline charge end to end
#[test]
fn test_cli_charge_offline() {
    let output = demo(&["charge", "15.99", "--offline", "--yes"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "charge failed: {}", stdout);
    assert!(stdout.contains("Payment successful"));
    assert!(stdout.contains("15.99 usd"));
}

/// Test that a decline exits with an error
#[test]
fn test_cli_charge_declined() {
    let output = demo(&["charge", "20.01", "--offline", "--yes"]);
    assert!(!output.status.success());
}

/// Test that malformed amounts are rejected before any reader work
#[test]
fn test_cli_rejects_bad_amount() {
    let output = demo(&["charge", "12.345", "--offline", "--yes"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.to_lowercase().contains("amount"));
}
