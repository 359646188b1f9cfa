//! Corruption recovery tests for the remedio binary.
//!
//! The durable store treats unreadable or unparseable values as absent,
//! so a damaged file must never take the CLI down; the next successful
//! mutation rewrites it whole.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("remedio"))
}

#[test]
fn test_corrupt_medications_treated_as_empty() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("medications.json"), "{ not json at all").unwrap();

    cli()
        .arg("list")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No medications"));
}

#[test]
fn test_corrupt_history_treated_as_empty() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("history.json"), "\u{0}\u{0}garbage").unwrap();

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses taken"));
}

#[test]
fn test_mutation_rewrites_corrupt_file() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("medications.json"), "[[[").unwrap();

    cli()
        .args(["add", "Aspirin", "--at", "08:00"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success();

    // The file is valid JSON again and the medication is there
    let raw = fs::read_to_string(temp_dir.path().join("medications.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
}

#[test]
fn test_corrupt_medications_does_not_touch_history() {
    let temp_dir = setup_test_dir();

    cli()
        .args(["add", "Aspirin", "--at", "08:00"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success();
    cli()
        .args(["take", "aspirin", "08:00"])
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success();

    // Damage only the medication set
    fs::write(temp_dir.path().join("medications.json"), "oops").unwrap();

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Aspirin"));
}

#[test]
fn test_missing_data_dir_created_on_first_write() {
    let temp_dir = setup_test_dir();
    let nested = temp_dir.path().join("deeply").join("nested");

    cli()
        .args(["add", "Aspirin", "--at", "08:00"])
        .arg("--data-dir")
        .arg(&nested)
        .assert()
        .success();

    assert!(nested.join("medications.json").exists());
}

#[test]
fn test_empty_data_dir_is_valid() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("today")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No doses"));
}
