#![allow(missing_docs)]
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn otp(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("otp-cli").unwrap();
    cmd.arg("--root").arg(root).env_remove("OTP_ROOT");
    cmd
}

fn stdout_lines(cmd: &mut Command) -> Vec<String> {
    let output = cmd.output().expect("Failed to run otp-cli");
    assert!(output.status.success(), "{output:?}");
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_full_message_workflow() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    // 1. Setup creates the layout, the config file and the pads
    let pads = stdout_lines(otp(root).args(["setup", "--count", "3", "--size", "256"]));
    assert_eq!(pads.len(), 3);
    assert!(root.join("otp_config.json").exists());
    for pad in &pads {
        assert!(root.join("Device/pads").join(pad).exists());
        assert!(root.join("Server/pads").join(pad).exists());
    }

    // 2. Send a message with a negative longitude
    let sent = stdout_lines(otp(root).args([
        "send",
        "--category",
        "Alert",
        "--lat",
        "40.7128",
        "--lon",
        "-74.0060",
        "--info",
        "Target secure",
    ]));
    let item = &sent[0];
    assert!(root.join("Server/incoming").join(item).exists());
    assert_eq!(sent[1], "Remaining pads: 2");

    // 3. Poll decrypts it
    otp(root)
        .arg("poll")
        .assert()
        .success()
        .stdout(predicate::str::contains("Decrypted: 1"));
    assert!(!root.join("Server/incoming").join(item).exists());

    // 4. The record is listed
    otp(root)
        .arg("messages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Type:      Alert"))
        .stdout(predicate::str::contains("Longitude: -74.0060"))
        .stdout(predicate::str::contains("Info:      Target secure"));

    // 5. Both copies of the used pad are gone
    otp(root)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sender Pads: 2 (512 bytes)"))
        .stdout(predicate::str::contains("Receiver Pads: 2 (512 bytes)"))
        .stdout(predicate::str::contains("Pending Messages: 0"))
        .stdout(predicate::str::contains("Decrypted Messages: 1"));
}

#[test]
fn test_send_without_pads_fails() {
    let temp_dir = tempdir().unwrap();
    otp(temp_dir.path())
        .args(["send", "--category", "Alert", "--lat", "1", "--lon", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to send message"));
}

#[test]
fn test_send_rejects_non_numeric_coordinates() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    otp(root).args(["setup", "--count", "1"]).assert().success();

    otp(root)
        .args(["send", "--category", "Alert", "--lat", "north", "--lon", "2"])
        .assert()
        .failure();
    otp(root)
        .arg("status")
        .assert()
        .stdout(predicate::str::contains("Sender Pads: 1"));
}

#[test]
fn test_pads_lists_json() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let names = stdout_lines(otp(root).args(["setup", "--count", "2", "--size", "64"]));

    let output = otp(root).arg("pads").output().unwrap();
    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let listing = listing.as_array().unwrap();
    assert_eq!(listing.len(), 2);
    for entry in listing {
        assert_eq!(entry["size"], 64);
        assert!(names.iter().any(|n| entry["name"] == n.as_str()));
    }
}

#[test]
fn test_purge_orphans_and_all() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let names = stdout_lines(otp(root).args(["setup", "--count", "2", "--size", "64"]));
    fs::remove_file(root.join("Device/pads").join(&names[0])).unwrap();

    otp(root)
        .args(["purge", "orphans"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 pad(s)."));
    assert!(!root.join("Server/pads").join(&names[0]).exists());

    otp(root)
        .args(["purge", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 2 pad(s)."));
    otp(root)
        .args(["purge", "sender"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pads found to delete."));
}

#[test]
fn test_retry_after_missing_pad_is_restored() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    let names = stdout_lines(otp(root).args(["setup", "--count", "1", "--size", "128"]));
    let receiver_pad = root.join("Server/pads").join(&names[0]);
    let saved = fs::read(&receiver_pad).unwrap();
    fs::remove_file(&receiver_pad).unwrap();

    otp(root)
        .args(["send", "--category", "Info", "--lat", "0", "--lon", "0"])
        .assert()
        .success();
    otp(root)
        .arg("poll")
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed: 1"));

    fs::write(&receiver_pad, saved).unwrap();
    otp(root)
        .arg("retry")
        .assert()
        .success()
        .stdout(predicate::str::contains("Decrypted: 1"));
}

#[test]
fn test_root_from_environment() {
    let temp_dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("otp-cli").unwrap();
    cmd.env("OTP_ROOT", temp_dir.path())
        .args(["setup", "--count", "1", "--size", "32"])
        .assert()
        .success();
    assert!(temp_dir.path().join("Device/pads").is_dir());
}

#[test]
fn test_unknown_purge_target_is_rejected() {
    let temp_dir = tempdir().unwrap();
    otp(temp_dir.path())
        .args(["purge", "everything"])
        .assert()
        .failure();
}
