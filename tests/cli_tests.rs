//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with its config directory pointed at a fresh temporary directory
fn labscribe(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("labscribe").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("GEMINI_API_KEY")
        .env_remove("LABSCRIBE_BIND")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_output() {
    let home = TempDir::new().unwrap();
    labscribe(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("procedures"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn version_output() {
    let home = TempDir::new().unwrap();
    labscribe(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("labscribe"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn serve_help_lists_flags() {
    let home = TempDir::new().unwrap();
    labscribe(&home)
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--blob-dir"))
        .stdout(predicate::str::contains("--journal-dir"))
        .stdout(predicate::str::contains("--max-upload"))
        .stdout(predicate::str::contains("--fake-backend"));
}

#[test]
fn config_help() {
    let home = TempDir::new().unwrap();
    labscribe(&home)
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("path"));
}

#[cfg(target_os = "linux")]
#[test]
fn config_path_command() {
    let home = TempDir::new().unwrap();
    labscribe(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("labscribe"))
        .stdout(predicate::str::contains("config.toml"));
}

#[cfg(target_os = "linux")]
#[test]
fn config_init_then_list() {
    let home = TempDir::new().unwrap();
    labscribe(&home).args(["config", "init"]).assert().success();
    assert!(home.path().join("labscribe").join("config.toml").exists());

    labscribe(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("result_ttl: 1h"))
        .stdout(predicate::str::contains("weights.extracting_start: 80"))
        .stdout(predicate::str::contains("api_key: (not set)"));

    labscribe(&home)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[cfg(target_os = "linux")]
#[test]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();
    labscribe(&home)
        .args(["config", "set", "transcription_timeout", "15m"])
        .assert()
        .success();

    labscribe(&home)
        .args(["config", "get", "transcription_timeout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("15m"));
}

#[cfg(target_os = "linux")]
#[test]
fn config_get_masks_api_key() {
    let home = TempDir::new().unwrap();
    labscribe(&home)
        .args(["config", "set", "api_key", "AIzaSyLongSecretValue9876"])
        .assert()
        .success();

    labscribe(&home)
        .args(["config", "get", "api_key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AIza...9876"))
        .stdout(predicate::str::contains("Secret").not());
}
