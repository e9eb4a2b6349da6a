//! CLI end-to-end tests for capture, replay and config commands.
//!
//! Every invocation passes `--config` pointing at a temp directory so a
//! developer's own capture.json never leaks into results.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

// ============================================================================
// Helpers
// ============================================================================

fn bc_core(config_dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("bc-core");
    cmd.timeout(Duration::from_secs(60));
    cmd.env_remove("RUST_LOG");
    cmd.arg("--config").arg(config_dir);
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("parse JSON")
}

fn session_path(json: &Value) -> PathBuf {
    PathBuf::from(json["output_dir"].as_str().expect("output_dir"))
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("capture.json");
    fs::write(&path, body).expect("write config");
    path
}

// ============================================================================
// capture
// ============================================================================

#[test]
fn test_capture_writes_csv_per_channel() {
    let config = tempdir().unwrap();
    let out = tempdir().unwrap();

    let json = json_stdout(
        bc_core(config.path())
            .args(["--format", "json", "capture", "--samples", "100", "--capacity", "16"])
            .arg("--out")
            .arg(out.path()),
    );

    assert_eq!(json["readings"], 100);
    assert_eq!(json["dispatch"]["delivered"], 12);
    assert_eq!(json["dispatch"]["dropped"], 0);
    let channels = json["channels"].as_array().expect("channels");
    assert_eq!(channels.len(), 2);
    for channel in channels {
        assert_eq!(channel["batches"], 6);
        assert_eq!(channel["discarded"], 4);
    }

    let dir = session_path(&json);
    assert!(dir.starts_with(out.path()));
    let accel = fs::read_to_string(dir.join("accelerometer.csv")).unwrap();
    let lines: Vec<&str> = accel.lines().collect();
    assert_eq!(lines[0], "timestamp,x,y,z");
    assert_eq!(lines.len(), 1 + 96);
    assert!(dir.join("gyroscope.csv").exists());
}

#[test]
fn test_capture_jsonl_sink() {
    let config = tempdir().unwrap();
    let out = tempdir().unwrap();

    let json = json_stdout(
        bc_core(config.path())
            .args([
                "--format", "json", "capture", "--samples", "64", "--capacity", "32", "--sink",
                "jsonl", "--channel", "gyroscope",
            ])
            .arg("--out")
            .arg(out.path()),
    );

    let content = fs::read_to_string(session_path(&json).join("batches.jsonl")).unwrap();
    let records: Vec<Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["channel"], "gyroscope");
    assert_eq!(records[1]["sequence"], 1);
    assert_eq!(records[0]["timestamps"].as_array().unwrap().len(), 32);
    assert_eq!(records[0]["values"].as_array().unwrap().len(), 96);
}

#[test]
fn test_capture_with_preset_human_output() {
    let config = tempdir().unwrap();
    let out = tempdir().unwrap();

    bc_core(config.path())
        .args(["capture", "--preset", "accel-only", "--samples", "10"])
        .arg("--out")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Session cap-"))
        .stdout(predicate::str::contains("accelerometer"))
        .stdout(predicate::str::contains("gyroscope").not());
}

#[test]
fn test_capture_unknown_preset_exit_10() {
    let config = tempdir().unwrap();
    bc_core(config.path())
        .args(["capture", "--preset", "band-9000"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("unknown preset"));
}

#[test]
fn test_capture_zero_capacity_exit_10_json() {
    let config = tempdir().unwrap();
    let out = tempdir().unwrap();

    let output = bc_core(config.path())
        .args(["--format", "json", "capture", "--capacity", "0"])
        .arg("--out")
        .arg(out.path())
        .assert()
        .code(10)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["error"]["code"], 10);
    assert_eq!(json["exit_code"], 10);
}

// ============================================================================
// replay
// ============================================================================

#[test]
fn test_replay_capture_file() {
    let config = tempdir().unwrap();
    let out = tempdir().unwrap();
    let input = out.path().join("walk.csv");
    let mut body = String::from("timestamp,ax,ay,az,gx,gy,gz\n");
    for i in 0..8 {
        body.push_str(&format!("{},0.1,0.2,9.8,1,2,{}\n", i * 16, i));
    }
    fs::write(&input, body).unwrap();

    let json = json_stdout(
        bc_core(config.path())
            .args(["--format", "json", "replay"])
            .arg(&input)
            .args(["--capacity", "4"])
            .arg("--out")
            .arg(out.path()),
    );
    assert_eq!(json["source"], "csv-replay");
    assert_eq!(json["readings"], 8);

    let gyro = fs::read_to_string(session_path(&json).join("gyroscope.csv")).unwrap();
    let last = gyro.lines().last().unwrap();
    // The z axis carries the gyroscope's own value.
    assert_eq!(last, "112,1,2,7");
}

#[test]
fn test_replay_missing_file_exit_11() {
    let config = tempdir().unwrap();
    let out = tempdir().unwrap();
    bc_core(config.path())
        .args(["replay", "/nonexistent/walk.csv"])
        .arg("--out")
        .arg(out.path())
        .assert()
        .code(11);
}

#[test]
fn test_replay_malformed_line_exit_11() {
    let config = tempdir().unwrap();
    let out = tempdir().unwrap();
    let input = out.path().join("bad.csv");
    fs::write(&input, "0,1,2,3,4,5,6\n16,oops\n").unwrap();

    bc_core(config.path())
        .arg("replay")
        .arg(&input)
        .arg("--out")
        .arg(out.path())
        .assert()
        .code(11)
        .stderr(predicate::str::contains(":2:"));
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_config_show_defaults() {
    let config = tempdir().unwrap();
    let json = json_stdout(bc_core(config.path()).args(["--format", "json", "config", "show"]));
    assert_eq!(json["resolved"]["using_defaults"], true);
    assert_eq!(json["resolved"]["config"]["buffer_capacity"], 256);
    assert_eq!(json["resolved"]["config"]["overflow"], "drop_newest");
}

#[test]
fn test_config_show_reads_file() {
    let config = tempdir().unwrap();
    write_config(&config, r#"{"buffer_capacity": 128, "sample_rate": "ms128"}"#);

    bc_core(config.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("buffer_capacity: 128"))
        .stdout(predicate::str::contains("ms128"));
}

#[test]
fn test_config_show_malformed_file_exit_10() {
    let config = tempdir().unwrap();
    write_config(&config, "{not json");
    bc_core(config.path())
        .args(["config", "show"])
        .assert()
        .code(10);
}

#[test]
fn test_config_validate_reports_all_errors() {
    let config = tempdir().unwrap();
    let file = write_config(
        &config,
        r#"{"buffer_capacity": 0, "queue_depth": 0, "channels": []}"#,
    );

    let output = bc_core(config.path())
        .args(["--format", "json", "config", "validate"])
        .arg(&file)
        .assert()
        .code(10)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["errors"].as_array().unwrap().len(), 3);
}

#[test]
fn test_config_validate_ok() {
    let config = tempdir().unwrap();
    let file = write_config(&config, r#"{"buffer_capacity": 64}"#);
    bc_core(config.path())
        .args(["config", "validate"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn test_config_presets() {
    let config = tempdir().unwrap();
    let json = json_stdout(bc_core(config.path()).args(["--format", "json", "config", "presets"]));
    let names: Vec<&str> = json["presets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["band-gyro-16ms", "band-dual-128ms", "accel-only"]);
}
