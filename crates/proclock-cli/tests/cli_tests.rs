//! CLI integration tests for proclock-cli
//!
//! Runs the built binary against scripts and configs written to temp dirs.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run the CLI with an empty config file so `~/.proclock` is ignored
fn run_proclock(dir: &Path, args: &[&str]) -> std::process::Output {
    let config = dir.join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "").unwrap();
    }
    Command::new(env!("CARGO_BIN_EXE_proclock"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn write_script(dir: &Path, script: &str) -> String {
    let path = dir.join("script.toml");
    std::fs::write(&path, script).unwrap();
    path.to_string_lossy().into_owned()
}

const WAITING_SCRIPT: &str = r#"
[[step]]
action = "wait"
proc = 1
table = "ns4:table4"

[[step]]
action = "wait"
proc = 2
lock = "shared"
table = "ns4:table4"

[[step]]
action = "list-locks"
"#;

// ==================== Help & Version Tests ====================

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = run_proclock(dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("proclock"));
    assert!(stdout.contains("replay"));
    assert!(stdout.contains("config"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    let output = run_proclock(dir.path(), &["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("proclock"));
}

// ==================== Replay Tests ====================

#[test]
fn test_replay_prints_waiting_report() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), WAITING_SCRIPT);

    let output = run_proclock(dir.path(), &["replay", &script]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "NAMESPACE(ns4)\n\
         Lock type: SHARED, count: 1\n\
         \n\
         TABLE(ns4:table4)\n\
         Lock type: EXCLUSIVE, procedure: 1\n\
         Waiting procedures:\n\
         Lock type  Procedure Id\n \
         SHARED 2\n\
         1 row(s)\n\
         \n"
    );
}

#[test]
fn test_replay_server_lock() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        r#"
        [[step]]
        action = "wait"
        proc = 0
        server = "server1,1234,0"

        [[step]]
        action = "list-locks"

        [[step]]
        action = "wake"
        proc = 0
        server = "server1,1234,0"

        [[step]]
        action = "list-locks"
        "#,
    );

    let output = run_proclock(dir.path(), &["replay", &script]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "SERVER(server1,1234,0)\nLock type: EXCLUSIVE, procedure: 0\n\n");
}

#[test]
fn test_replay_json() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        &format!(
            "{}{}",
            WAITING_SCRIPT,
            r#"
[[step]]
action = "wake"
proc = 1
table = "ns4:table4"
"#
        ),
    );

    let output = run_proclock(dir.path(), &["--json", "replay", &script]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON");
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0]["status"], "granted");
    assert_eq!(steps[1]["status"], "waiting");
    assert_eq!(steps[3]["woken"], serde_json::json!([2]));

    let table = &json["reports"][0]["locks"][1];
    assert_eq!(table["kind"], "TABLE");
    assert_eq!(table["identity"], "ns4:table4");
    assert_eq!(table["waiting"][0]["lock_type"], "shared");
    assert_eq!(json["metrics"]["events"]["locks.queued"]["table"], 1);
    assert_eq!(json["idle"], false);
}

#[test]
fn test_replay_fair_flag() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        r#"
        [[step]]
        action = "wait"
        proc = 1
        lock = "shared"
        table = "ns:t"

        [[step]]
        action = "wait"
        proc = 2
        table = "ns:t"

        [[step]]
        action = "wait"
        proc = 3
        lock = "shared"
        table = "ns:t"
        "#,
    );

    let output = run_proclock(dir.path(), &["--json", "replay", &script]);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["steps"][2]["status"], "granted");

    let output = run_proclock(dir.path(), &["--json", "--fair", "replay", &script]);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["steps"][2]["status"], "waiting");
}

#[test]
fn test_replay_invalid_release_fails() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        r#"
        [[step]]
        action = "wake"
        proc = 7
        table = "ns:t"
        "#,
    );

    let output = run_proclock(dir.path(), &["replay", &script]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Step 0 (wake)"));
    assert!(stderr.contains("holds no EXCLUSIVE lock"));
}

#[test]
fn test_replay_bad_target() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        r#"
        [[step]]
        action = "wait"
        proc = 1
        "#,
    );

    let output = run_proclock(dir.path(), &["--json", "replay", &script]);
    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("Step 0"));
}

#[test]
fn test_replay_missing_script() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.toml");
    let output = run_proclock(dir.path(), &["replay", missing.to_str().unwrap()]);
    assert!(!output.status.success());
}

// ==================== Config Tests ====================

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();
    let output = run_proclock(dir.path(), &["--json", "config", "--show"]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["log_level"], "warn");
    assert_eq!(json["scheduler"]["fair_admission"], false);
    assert_eq!(json["scheduler"]["system_namespace_table"], "hbase:namespace");
}

#[test]
fn test_config_file_and_flags() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "log_level = \"info\"\n\n[scheduler]\nmetrics = false\n",
    )
    .unwrap();

    let output = run_proclock(dir.path(), &["--fair", "config", "--show"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("log_level = \"info\""));
    assert!(stdout.contains("fair_admission = true"));
    assert!(stdout.contains("metrics = false"));
}

#[test]
fn test_config_invalid_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[scheduler]\nfair_admission = 3\n").unwrap();

    let output = run_proclock(dir.path(), &["config", "--show"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config error"));
}
