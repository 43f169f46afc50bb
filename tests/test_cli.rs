#[cfg(test)]
extern crate assert_cmd;
extern crate predicates;

use assert_cmd::prelude::*;
use predicates::prelude::*;

use std::process::Command;

#[test]
fn test_cli() {
    let mut cmd = Command::cargo_bin("cryosync").expect("Calling binary failed");
    cmd.assert().failure();
}

#[test]
fn test_version() {
    let expected_version = "cryosync 2.0.1\n";
    let mut cmd = Command::cargo_bin("cryosync").expect("Calling binary failed");
    cmd.arg("--version").assert().stdout(expected_version);
}

#[test]
fn test_sync_copies_project() {
    let source = tempfile::tempdir().unwrap();
    let project = source.path().join("P7");
    std::fs::create_dir_all(project.join("J1")).unwrap();
    std::fs::write(project.join("J1/job.json"), "{}").unwrap();
    let dest = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("cryosync").expect("Calling binary failed");
    cmd.arg("sync")
        .arg("--source")
        .arg(&project)
        .arg("--dest")
        .arg(dest.path())
        .args(["--interval", "0", "--max-retries", "1"])
        .env_remove("SOURCE_DIR")
        .env_remove("DEST_DIR")
        .env_remove("TIMEOUT")
        .env_remove("NO_LOG")
        .current_dir(source.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Transferred     : 1"));

    assert!(dest.path().join("P7/J1/job.json").exists());
    let ledger = std::fs::read_to_string(source.path().join("sync_log.txt")).unwrap();
    assert!(ledger.contains("job.json"));
}

#[test]
fn test_sync_without_ledger() {
    let source = tempfile::tempdir().unwrap();
    let project = source.path().join("P8");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::write(project.join("movie.tiff"), "raw").unwrap();
    let dest = tempfile::tempdir().unwrap();

    let mut cmd = Command::cargo_bin("cryosync").expect("Calling binary failed");
    cmd.arg("sync")
        .arg("--source")
        .arg(&project)
        .arg("--dest")
        .arg(dest.path())
        .args(["--interval", "0", "--max-retries", "1", "--no-log", "--no-progress"])
        .env_remove("SOURCE_DIR")
        .env_remove("DEST_DIR")
        .env_remove("TIMEOUT")
        .current_dir(source.path())
        .assert()
        .success();

    assert!(dest.path().join("P8/movie.tiff").exists());
    assert!(!source.path().join("sync_log.txt").exists());
}

#[test]
fn test_monitor_requires_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("cryosync").expect("Calling binary failed");
    cmd.arg("monitor")
        .arg("--base-dir")
        .arg(dir.path().join("missing"))
        .assert()
        .failure();
}
