use predicates::str::contains;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

fn write_temp_file(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be available")
        .as_nanos();
    path.push(format!("dispatch-errors-{}.{}", nanos, extension));
    fs::write(&path, contents).expect("file write should succeed");
    path
}

#[test]
fn zero_dispatchers_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dispatch-sim");
    cmd.args(["--dispatchers", "0"]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: dispatchers must be greater than 0"));
}

#[test]
fn unknown_handle_time_flag_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dispatch-sim");
    cmd.args(["run", "--handle-time", "7"]);
    cmd.assert()
        .failure()
        .stderr(contains("expected one of 1, 3, 5, random"));
}

#[test]
fn failure_rate_out_of_range_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dispatch-sim");
    cmd.args(["--delete-failure-rate", "1.5"]);
    cmd.assert().failure().stderr(contains(
        "Error: delete_failure_rate must be between 0 and 1 (got 1.5)",
    ));
}

#[test]
fn missing_config_file_fails() {
    let mut path = std::env::temp_dir();
    path.push("dispatch-does-not-exist.toml");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dispatch-sim");
    cmd.args(["run", "--config", path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: failed to read config"));
}

#[test]
fn unsupported_config_extension_fails() {
    let path = write_temp_file("dispatchers: 2\n", "yaml");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dispatch-sim");
    cmd.args(["run", "--config", path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: unsupported config format 'yaml'"));
}

#[test]
fn malformed_explicit_config_fails() {
    let path = write_temp_file("dispatchers = [", "toml");
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dispatch-sim");
    cmd.args(["run", "--config", path.to_str().unwrap()]);
    cmd.assert()
        .failure()
        .stderr(contains("Error: failed to parse TOML"));
}

#[test]
fn config_and_saved_config_conflict() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("dispatch-sim");
    cmd.args(["--config", "a.toml", "--saved-config", "b.json"]);
    cmd.assert().failure().stderr(contains("Error:"));
}
