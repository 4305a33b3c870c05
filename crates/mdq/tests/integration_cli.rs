//! Integration tests for the mdq binary

use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Build an mdq command pointed at `root` with a fast poll notifier
fn mdq(root: &Path) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("mdq");
    cmd.env_remove("MDQ_PATH")
        .env_remove("MDQ_CONFIG")
        .env_remove("MDQ_PERSISTENT")
        .env_remove("MDQ_NOTIFIER")
        .env("MDQ_LOG", "warn")
        .arg("--path")
        .arg(root)
        .arg("--notifier")
        .arg("poll");
    cmd
}

fn stdout_of(cmd: &mut assert_cmd::Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn test_push_then_pop() {
    let temp_dir = TempDir::new().unwrap();

    let name = stdout_of(mdq(temp_dir.path()).args(["push", r#"{"hello":"world"}"#]));
    let name = name.trim();
    assert!(temp_dir.path().join("new").join(name).exists());

    mdq(temp_dir.path())
        .arg("length")
        .assert()
        .success()
        .stdout("1\n");

    let popped = stdout_of(mdq(temp_dir.path()).args(["pop", "--timeout-secs", "5"]));
    let value: serde_json::Value = serde_json::from_str(&popped).unwrap();
    assert_eq!(value, serde_json::json!({ "hello": "world" }));

    mdq(temp_dir.path())
        .arg("length")
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_push_from_stdin() {
    let temp_dir = TempDir::new().unwrap();

    mdq(temp_dir.path())
        .args(["push", "--stdin"])
        .write_stdin("[1, 2, 3]\n")
        .assert()
        .success();

    mdq(temp_dir.path())
        .args(["pop", "--no-wait"])
        .assert()
        .success()
        .stdout("[1,2,3]\n");
}

#[test]
fn test_push_rejects_invalid_json() {
    let temp_dir = TempDir::new().unwrap();

    mdq(temp_dir.path())
        .args(["push", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));

    mdq(temp_dir.path())
        .arg("length")
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_pop_times_out_on_empty_queue() {
    let temp_dir = TempDir::new().unwrap();

    mdq(temp_dir.path())
        .args(["pop", "--timeout-secs", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No message arrived within 1s"));
}

#[test]
fn test_pop_no_wait_on_empty_queue() {
    let temp_dir = TempDir::new().unwrap();

    mdq(temp_dir.path())
        .args(["pop", "--no-wait"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Queue is empty"));
}

#[test]
fn test_produce_then_consume_in_order() {
    let temp_dir = TempDir::new().unwrap();

    mdq(temp_dir.path())
        .arg("produce")
        .write_stdin("{\"time\":0}\n\n{\"time\":1}\n{\"time\":2}\n")
        .assert()
        .success()
        .stdout("Pushed 3 messages\n");

    mdq(temp_dir.path())
        .args(["consume", "--count", "3"])
        .assert()
        .success()
        .stdout("{\"time\":0}\n{\"time\":1}\n{\"time\":2}\n");

    mdq(temp_dir.path())
        .arg("length")
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_produce_stops_at_invalid_line() {
    let temp_dir = TempDir::new().unwrap();

    mdq(temp_dir.path())
        .arg("produce")
        .write_stdin("{\"ok\":1}\nnope\n{\"ok\":2}\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Line 2 is not valid JSON"));

    mdq(temp_dir.path())
        .arg("length")
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn test_clear_removes_everything() {
    let temp_dir = TempDir::new().unwrap();

    mdq(temp_dir.path()).args(["push", "1"]).assert().success();
    mdq(temp_dir.path()).args(["push", "2"]).assert().success();
    fs::write(temp_dir.path().join("cur").join("1.0.1.1.held"), b"3").unwrap();
    fs::write(temp_dir.path().join("tmp").join("1.1.1.1.partial"), b"4").unwrap();

    mdq(temp_dir.path()).arg("clear").assert().success();

    for dir in ["tmp", "new", "cur"] {
        assert_eq!(fs::read_dir(temp_dir.path().join(dir)).unwrap().count(), 0);
    }
}

#[test]
fn test_recover_returns_claimed_messages() {
    let temp_dir = TempDir::new().unwrap();

    // Creates the directory layout
    mdq(temp_dir.path())
        .arg("length")
        .assert()
        .success()
        .stdout("0\n");
    fs::write(temp_dir.path().join("cur").join("1.0.1.1.orphan"), b"{\"left\":\"behind\"}").unwrap();

    mdq(temp_dir.path())
        .arg("recover")
        .assert()
        .success()
        .stdout("Restored 1 claimed messages\n");

    mdq(temp_dir.path())
        .args(["pop", "--no-wait"])
        .assert()
        .success()
        .stdout("{\"left\":\"behind\"}\n");
}

#[test]
fn test_path_from_environment() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("mdq");
    cmd.env("MDQ_PATH", temp_dir.path())
        .env("MDQ_LOG", "warn")
        .args(["push", "\"via env\""])
        .assert()
        .success();

    assert_eq!(fs::read_dir(temp_dir.path().join("new")).unwrap().count(), 1);
}

#[test]
fn test_path_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let queue_root = temp_dir.path().join("spool");
    let config_path = temp_dir.path().join("mdq.toml");
    fs::write(
        &config_path,
        format!(
            "[queue]\npath = {:?}\nnotifier = \"poll\"\n",
            queue_root.to_str().unwrap()
        ),
    )
    .unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("mdq");
    cmd.env_remove("MDQ_PATH")
        .env("MDQ_LOG", "warn")
        .arg("--config")
        .arg(&config_path)
        .args(["push", "42"])
        .assert()
        .success();

    assert_eq!(fs::read_dir(queue_root.join("new")).unwrap().count(), 1);
}

#[test]
fn test_unknown_notifier_is_rejected() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = cargo::cargo_bin_cmd!("mdq");
    cmd.arg("--path")
        .arg(temp_dir.path())
        .args(["--notifier", "carrier-pigeon", "length"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown notifier"));
}
