//! CLI tests: spawn the agent binary and check exit codes and output.

use std::fs;
use std::process::Command;

use agent::exit_codes;

const ENV_KEYS: &[&str] = &[
    "GITHUB_TOKEN",
    "GITHUB_REPOSITORY",
    "GITHUB_EVENT_PATH",
    "AGENT_CONFIG",
    "DEFAULT_BRANCH",
    "MAKE_WEBHOOK_URL",
];

fn agent(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_agent"));
    cmd.current_dir(dir);
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn bootstrap_without_token_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent(temp.path()).arg("bootstrap").output().expect("agent bootstrap");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GITHUB_TOKEN is not set"), "stderr: {stderr}");
}

#[test]
fn command_with_malformed_repository_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent(temp.path())
        .args(["command", "--text", "/help", "--issue", "1"])
        .env("GITHUB_TOKEN", "t")
        .env("GITHUB_REPOSITORY", "not-a-slug")
        .output()
        .expect("agent command");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("owner/name"), "stderr: {stderr}");
}

#[test]
fn config_prints_defaults_when_file_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent(temp.path()).arg("config").output().expect("agent config");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(value["timezone"], "Europe/London");
    assert_eq!(value["gotm"]["vote_window_days"], 7);
    assert_eq!(
        value["site"]["ensure_files"],
        serde_json::json!(["data/table.json", "data/live.json"])
    );
}

#[test]
fn config_flag_selects_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("site.toml");
    fs::write(&path, "timezone = \"UTC\"\n\n[gotm]\nvote_window_days = 3\n").expect("write");

    let output = agent(temp.path())
        .args(["config", "--config"])
        .arg(&path)
        .output()
        .expect("agent config");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(value["timezone"], "UTC");
    assert_eq!(value["gotm"]["vote_window_days"], 3);
}

#[test]
fn invalid_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("agent.toml"),
        "[gotm]\nvote_window_days = 0\n",
    )
    .expect("write");

    let output = agent(temp.path()).arg("config").output().expect("agent config");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("vote_window_days"), "stderr: {stderr}");
}
