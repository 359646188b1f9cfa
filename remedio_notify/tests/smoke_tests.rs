//! Smoke tests for the remedio-notify daemon binary.
//!
//! `--once` performs activation plus a single recompute and exits, which
//! is enough to exercise the mirror-load and arming path end to end
//! without leaving a process running.

use assert_cmd::Command;
use chrono::NaiveDate;
use predicates::prelude::*;
use remedio_core::{DosingRule, FileStore, Tracker};
use tempfile::TempDir;

fn daemon() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("remedio-notify"))
}

#[test]
fn test_once_with_empty_store() {
    let temp_dir = TempDir::new().unwrap();

    daemon()
        .args(["--once", "--stdout"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("armed 0 reminder(s)"));
}

#[test]
fn test_once_picks_up_foreground_set() {
    let temp_dir = TempDir::new().unwrap();

    // A daily medication with doses spread over the day always has at
    // least one occurrence inside the 48h horizon, whatever the wall
    // clock says when the test runs.
    let mut tracker = Tracker::load(FileStore::new(temp_dir.path())).unwrap();
    tracker
        .add_medication(
            "Aspirin",
            DosingRule::FixedTimes {
                times: vec!["00:30".into(), "12:00".into(), "23:30".into()],
            },
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            None,
        )
        .unwrap();

    daemon()
        .args(["--once", "--stdout"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"armed [1-9]\d* reminder\(s\)").unwrap());
}
