//! CLI end-to-end tests for the fileforge binary.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[allow(deprecated)]
fn fileforge_cmd() -> Command {
    Command::cargo_bin("fileforge").unwrap()
}

#[test]
fn no_args_shows_help() {
    fileforge_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn version_command() {
    fileforge_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fileforge"));
}

#[test]
fn check_tools_lists_known_tools() {
    fileforge_cmd()
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("pdf2docx"));
}

#[test]
fn classify_prints_type_and_catalogue() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("photo.png");
    fs::write(&file, common::png(5, 5)).unwrap();

    let output = fileforge_cmd().arg("classify").arg(&file).output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["fileType"]["category"], "image");
    assert_eq!(report["fileType"]["mimeType"], "image/png");
    let conversions = report["manipulationOptions"]["conversions"]
        .as_array()
        .unwrap();
    assert!(conversions.iter().any(|c| c["format"] == "webp"));
}

#[test]
fn classify_rejects_unknown_bytes() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("blob.bin");
    fs::write(&file, [0u8, 1, 2, 0, 4]).unwrap();

    fileforge_cmd()
        .arg("classify")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file type"));
}

#[test]
fn validate_reports_bad_json() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.json");
    fs::write(&good, r#"{"server": {"port": 9090}}"#).unwrap();
    fileforge_cmd()
        .arg("validate")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("9090"));

    let bad = dir.path().join("bad.json");
    fs::write(&bad, "{ not json").unwrap();
    fileforge_cmd().arg("validate").arg(&bad).assert().failure();
}
