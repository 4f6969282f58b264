//! CLI integration tests

use chrono::{Duration, TimeZone, Utc};
use ironclad_lib::{ReadingStore, SqliteStore};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn ironclad(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ironclad"));
    cmd.env_remove("IRONCLAD_DB_PATH")
        .env_remove("IRONCLAD_WARNING_THRESHOLD")
        .env_remove("IRONCLAD_CRITICAL_THRESHOLD")
        .env("NO_COLOR", "1")
        .args([
            "--db",
            dir.path().join("data.db").to_str().unwrap(),
            "--crash-trigger",
            dir.path().join("trigger_crash").to_str().unwrap(),
            "--freeze-trigger",
            dir.path().join("trigger_freeze").to_str().unwrap(),
        ]);
    cmd
}

fn run(dir: &TempDir, args: &[&str]) -> Output {
    ironclad(dir)
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn seed(path: &Path, values: &[f64]) {
    let mut store = SqliteStore::open(path).unwrap();
    store.initialize().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    for (i, value) in values.iter().enumerate() {
        store
            .append(*value, start + Duration::seconds(5 * i as i64))
            .unwrap();
    }
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = run(&dir, &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("IronClad"), "Should show app name");
    assert!(stdout.contains("readings"), "Should show readings command");
    assert!(stdout.contains("trigger"), "Should show trigger command");
    assert!(stdout.contains("clear"), "Should show clear command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    let output = run(&dir, &["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("ironclad"), "Should show binary name");
}

#[test]
fn test_trigger_and_clear() {
    let dir = TempDir::new().unwrap();
    let crash = dir.path().join("trigger_crash");
    let freeze = dir.path().join("trigger_freeze");

    assert!(run(&dir, &["trigger", "crash"]).status.success());
    assert!(crash.exists());
    assert!(!freeze.exists());

    assert!(run(&dir, &["trigger", "freeze"]).status.success());
    assert!(freeze.exists());

    assert!(run(&dir, &["clear", "crash"]).status.success());
    assert!(!crash.exists());
    assert!(freeze.exists());

    assert!(run(&dir, &["clear"]).status.success());
    assert!(!freeze.exists());

    // Clearing twice is fine.
    assert!(run(&dir, &["clear", "all"]).status.success());
}

#[test]
fn test_readings_json_newest_first_with_tiers() {
    let dir = TempDir::new().unwrap();
    seed(&dir.path().join("data.db"), &[95.0, 110.0, 130.0]);

    let output = run(&dir, &["--format", "json", "readings", "--limit", "2"]);
    assert!(output.status.success());

    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], 3);
    assert_eq!(items[0]["tier"], "critical");
    assert_eq!(items[1]["id"], 2);
    assert_eq!(items[1]["tier"], "warning");
}

#[test]
fn test_stats_json() {
    let dir = TempDir::new().unwrap();
    seed(&dir.path().join("data.db"), &[100.0, 120.0, 140.0]);

    let output = run(&dir, &["--format", "json", "stats"]);
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["count"], 3);
    assert_eq!(stats["min"], 100.0);
    assert_eq!(stats["max"], 140.0);
    assert_eq!(stats["tiers"]["normal"], 1);
    assert_eq!(stats["tiers"]["warning"], 1);
    assert_eq!(stats["tiers"]["critical"], 1);
}

#[test]
fn test_status_json() {
    let dir = TempDir::new().unwrap();
    seed(&dir.path().join("data.db"), &[80.0, 90.0]);
    assert!(run(&dir, &["trigger", "freeze"]).status.success());

    let output = run(&dir, &["--format", "json", "status"]);
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["db_present"], true);
    assert_eq!(status["readings"], 2);
    assert_eq!(status["last_reading"]["id"], 2);
    assert_eq!(status["crash_trigger"], false);
    assert_eq!(status["freeze_trigger"], true);
}

#[test]
fn test_read_commands_leave_legacy_store_untouched() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data.db");
    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE readings (val REAL, ts TEXT);
             INSERT INTO readings VALUES (101.0, '2024-03-01 12:00:00');
             INSERT INTO readings VALUES (125.0, '2024-03-01 12:00:05');",
        )
        .unwrap();
    }

    for args in [
        &["--format", "json", "status"][..],
        &["--format", "json", "readings"][..],
        &["--format", "json", "stats"][..],
    ] {
        let output = run(&dir, args);
        assert!(output.status.success(), "{args:?} should succeed");
    }

    let status: serde_json::Value =
        serde_json::from_slice(&run(&dir, &["--format", "json", "status"]).stdout).unwrap();
    assert_eq!(status["readings"], 2);
    assert_eq!(status["schema_version"], 0);

    let conn = rusqlite::Connection::open(&db).unwrap();
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap();
    let journal: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(version, 0);
    assert_eq!(journal, "delete");
}

#[test]
fn test_stats_tiers_on_threshold_boundaries() {
    let dir = TempDir::new().unwrap();
    seed(&dir.path().join("data.db"), &[100.0, 100.5, 120.0, 120.5]);

    let output = run(&dir, &["--format", "json", "stats"]);
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["tiers"]["normal"], 1);
    assert_eq!(stats["tiers"]["warning"], 2);
    assert_eq!(stats["tiers"]["critical"], 1);
}

#[test]
fn test_missing_database_is_not_created() {
    let dir = TempDir::new().unwrap();

    let output = run(&dir, &["readings"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No readings database"));
    assert!(!dir.path().join("data.db").exists());
}

#[test]
fn test_invalid_thresholds_rejected() {
    let dir = TempDir::new().unwrap();
    let output = run(
        &dir,
        &[
            "--warning-threshold",
            "130",
            "--critical-threshold",
            "120",
            "stats",
        ],
    );
    assert!(!output.status.success());
}
