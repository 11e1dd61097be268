use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_config_path_honours_flag() {
    Command::cargo_bin("qibot")
        .unwrap()
        .args(["config", "path", "--config", "/srv/qibot/custom.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/srv/qibot/custom.toml"));
}

#[test]
fn test_config_init_writes_template_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qibot.toml");

    Command::cargo_bin("qibot")
        .unwrap()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[session]"));

    Command::cargo_bin("qibot")
        .unwrap()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_generate_prints_template() {
    Command::cargo_bin("qibot")
        .unwrap()
        .args(["config", "generate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[rate_limit]"));
}
