use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("timeout_secs = 15"));
    assert!(contents.contains("# backend_url ="));
    assert!(contents.contains("[routes]"));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "# existing config").unwrap();

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_path_works_with_broken_backend_url() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", dir.path())
        .env("KONYX_BACKEND_URL", "not a url")
        .args(["config", "path"])
        .assert()
        .success();
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("konyx")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("admin"));
}
