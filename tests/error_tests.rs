//! Error scenario integration tests

use std::process::Command;

fn recorder_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_queue-recorder"))
}

#[test]
fn config_get_unknown_key() {
    let output = recorder_bin()
        .args(["config", "get", "unknown_key"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unknown") || stderr.contains("Valid"),
        "Expected error about unknown key, got: {}",
        stderr
    );
}

#[test]
fn config_set_unknown_key() {
    let output = recorder_bin()
        .args(["config", "set", "unknown_key", "value"])
        .env("XDG_CONFIG_HOME", "/nonexistent")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unknown") || stderr.contains("Valid"),
        "Expected error about unknown key, got: {}",
        stderr
    );
}

#[test]
fn config_set_invalid_duration() {
    let output = recorder_bin()
        .args(["config", "set", "max_duration", "invalid"])
        .env("XDG_CONFIG_HOME", "/nonexistent")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid") || stderr.contains("duration"),
        "Expected error about invalid duration, got: {}",
        stderr
    );
}

#[test]
fn config_set_invalid_container() {
    let output = recorder_bin()
        .args(["config", "set", "container", "wav"])
        .env("XDG_CONFIG_HOME", "/nonexistent")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("wav") && stderr.contains("caf"),
        "Expected error listing valid containers, got: {}",
        stderr
    );
}

#[test]
fn config_set_zero_channels() {
    let output = recorder_bin()
        .args(["config", "set", "channels", "0"])
        .env("XDG_CONFIG_HOME", "/nonexistent")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("positive"),
        "Expected error about channel count, got: {}",
        stderr
    );
}

#[test]
fn config_list_with_no_file() {
    // A missing config file lists every key as unset
    let output = recorder_bin()
        .args(["config", "list"])
        .env("HOME", "/nonexistent")
        .env("XDG_CONFIG_HOME", "/nonexistent")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("not set") && stdout.contains("buffer_count"),
        "Expected config list output, got: {}",
        stdout
    );
}
