//! E2E CLI tests for `sweep init` and `sweep cleanup`.
//!
//! Each test runs the `sweep` binary as a subprocess in an isolated temp
//! directory and seeds `.sweep/sweep.db` directly through SQLite.

use assert_cmd::Command;
use chrono::{DateTime, Duration, Utc};
use predicates::prelude::*;
use rusqlite::{Connection, params};
use serde_json::Value;
use std::path::Path;
use sweep_core::lock::{CLEANUP_OPERATION, OperationLock};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn sweep_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sweep"));
    cmd.current_dir(dir);
    cmd.env("SWEEP_LOG", "off");
    cmd.env_remove("FORMAT");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    sweep_cmd(dir.path()).args(["init", "-q"]).assert().success();
    dir
}

fn store(dir: &Path) -> Connection {
    Connection::open(dir.join(".sweep/sweep.db")).expect("open store")
}

fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn insert_campaign(conn: &Connection, id: &str, class_number: i64, created_at: DateTime<Utc>) {
    conn.execute(
        "INSERT INTO campaigns (
            campaign_id, title, body, notification_type, class_id, class_number, created_at_us
         ) VALUES (?1, 'Exam Reminder', 'Midterm starts at 9', 'exam', 'C1', ?2, ?3)",
        params![id, class_number, micros(created_at)],
    )
    .expect("insert campaign");
}

fn insert_notification(conn: &Connection, id: &str, recipient: &str, created_at: DateTime<Utc>) {
    conn.execute(
        "INSERT INTO notifications (
            notification_id, recipient_id, title, body, notification_type, created_at_us
         ) VALUES (?1, ?2, 'Quiz graded', 'Quiz 3 has been graded', 'grade', ?3)",
        params![id, recipient, micros(created_at)],
    )
    .expect("insert notification");
}

fn ids(conn: &Connection, sql: &str) -> Vec<String> {
    let mut stmt = conn.prepare(sql).expect("prepare");
    let ids = stmt
        .query_map([], |row| row.get(0))
        .expect("query")
        .collect::<rusqlite::Result<Vec<String>>>()
        .expect("collect");
    ids
}

fn campaign_ids(conn: &Connection) -> Vec<String> {
    ids(conn, "SELECT campaign_id FROM campaigns ORDER BY campaign_id")
}

fn notification_ids(conn: &Connection) -> Vec<String> {
    ids(conn, "SELECT notification_id FROM notifications ORDER BY notification_id")
}

fn cleanup_json(dir: &Path, extra: &[&str]) -> Value {
    let output = sweep_cmd(dir)
        .arg("cleanup")
        .arg("--json")
        .args(extra)
        .output()
        .expect("cleanup should not crash");
    assert!(
        output.status.success(),
        "cleanup failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("cleanup --json should produce valid JSON")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_creates_workspace() {
    let dir = init_project();
    assert!(dir.path().join(".sweep/config.toml").is_file());
    assert!(dir.path().join(".sweep/sweep.db").is_file());

    sweep_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn cleanup_removes_campaign_and_notification_duplicates() {
    let dir = init_project();
    let now = Utc::now();
    {
        let conn = store(dir.path());
        let t0 = now - Duration::days(120);
        insert_campaign(&conn, "c-t0", 10, t0);
        insert_campaign(&conn, "c-t1", 10, t0 + Duration::minutes(1));
        insert_campaign(&conn, "c-t2", 10, t0 + Duration::days(3));
        insert_campaign(&conn, "c-other", 11, t0);

        let recent = now - Duration::days(1);
        insert_notification(&conn, "n-a", "u-1", recent);
        insert_notification(&conn, "n-b", "u-1", recent + Duration::seconds(10));
        insert_notification(&conn, "n-c", "u-2", recent);
    }

    let json = cleanup_json(dir.path(), &[]);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["deletedCampaigns"], 2);
    assert_eq!(json["data"]["deletedNotifications"], 1);
    assert!(
        json["message"]
            .as_str()
            .is_some_and(|m| m.contains("2 duplicate campaign(s)"))
    );

    let conn = store(dir.path());
    assert_eq!(campaign_ids(&conn), vec!["c-other", "c-t0"]);
    assert_eq!(notification_ids(&conn), vec!["n-a", "n-c"]);
}

#[test]
fn second_run_deletes_nothing() {
    let dir = init_project();
    let now = Utc::now();
    {
        let conn = store(dir.path());
        insert_campaign(&conn, "c-1", 10, now - Duration::days(5));
        insert_campaign(&conn, "c-2", 10, now - Duration::days(4));
        insert_notification(&conn, "n-1", "u-1", now - Duration::hours(3));
        insert_notification(&conn, "n-2", "u-1", now - Duration::hours(2));
    }

    let first = cleanup_json(dir.path(), &[]);
    assert_eq!(first["data"]["deletedCampaigns"], 1);
    assert_eq!(first["data"]["deletedNotifications"], 1);

    let second = cleanup_json(dir.path(), &[]);
    assert_eq!(second["data"]["deletedCampaigns"], 0);
    assert_eq!(second["data"]["deletedNotifications"], 0);
}

#[test]
fn notifications_outside_window_are_kept() {
    let dir = init_project();
    let now = Utc::now();
    {
        let conn = store(dir.path());
        insert_notification(&conn, "n-old-1", "u-1", now - Duration::days(45));
        insert_notification(&conn, "n-old-2", "u-1", now - Duration::days(45));
    }

    let json = cleanup_json(dir.path(), &[]);
    assert_eq!(json["data"]["deletedNotifications"], 0);
    assert_eq!(notification_ids(&store(dir.path())).len(), 2);
}

#[test]
fn lookback_override_widens_window() {
    let dir = init_project();
    let now = Utc::now();
    {
        let conn = store(dir.path());
        insert_notification(&conn, "n-old-1", "u-1", now - Duration::days(45));
        insert_notification(&conn, "n-old-2", "u-1", now - Duration::days(45));
    }

    let json = cleanup_json(dir.path(), &["--lookback-days", "60"]);
    assert_eq!(json["data"]["deletedNotifications"], 1);
    assert_eq!(notification_ids(&store(dir.path())), vec!["n-old-1"]);
}

#[test]
fn dry_run_leaves_records_in_place() {
    let dir = init_project();
    let now = Utc::now();
    {
        let conn = store(dir.path());
        insert_campaign(&conn, "c-1", 10, now - Duration::days(5));
        insert_campaign(&conn, "c-2", 10, now - Duration::days(4));
    }

    let json = cleanup_json(dir.path(), &["--dry-run"]);
    assert_eq!(json["dryRun"], true);
    assert_eq!(json["data"]["deletedCampaigns"], 1);
    assert_eq!(campaign_ids(&store(dir.path())).len(), 2);
}

#[test]
fn text_output_reports_counts() {
    let dir = init_project();
    sweep_cmd(dir.path())
        .args(["cleanup", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "deleted_campaigns=0 deleted_notifications=0",
        ));
}

#[test]
fn uninitialized_directory_fails_with_code() {
    let dir = TempDir::new().expect("temp dir");
    sweep_cmd(dir.path())
        .args(["cleanup", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"success\": false"))
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn concurrent_run_fails_with_lock_contention() {
    let dir = init_project();
    {
        let conn = store(dir.path());
        let now = Utc::now();
        insert_campaign(&conn, "c-1", 10, now - Duration::days(5));
        insert_campaign(&conn, "c-2", 10, now - Duration::days(4));
    }
    let locks_dir = dir.path().join(".sweep/locks");
    let held =
        OperationLock::for_operation(&locks_dir, CLEANUP_OPERATION, std::time::Duration::ZERO)
            .expect("hold cleanup lock");

    sweep_cmd(dir.path())
        .args(["cleanup", "--json", "--lock-timeout-ms", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E5002"))
        .stderr(predicate::str::contains("suggestion"));
    assert_eq!(campaign_ids(&store(dir.path())).len(), 2);

    held.release();
    let json = cleanup_json(dir.path(), &[]);
    assert_eq!(json["data"]["deletedCampaigns"], 1);
}

#[test]
fn oversized_lookback_fails_before_any_deletion() {
    let dir = init_project();
    {
        let conn = store(dir.path());
        let now = Utc::now();
        insert_campaign(&conn, "c-1", 10, now - Duration::days(5));
        insert_campaign(&conn, "c-2", 10, now - Duration::days(4));
    }

    sweep_cmd(dir.path())
        .args(["cleanup", "--json", "--lookback-days", "100000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"))
        .stderr(predicate::str::contains("lookback_days"));
    assert_eq!(campaign_ids(&store(dir.path())).len(), 2);
}
