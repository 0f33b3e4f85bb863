use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn shell(base: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("project-k").unwrap();
    cmd.args(["--mode", "cli", "--base-path"])
        .arg(base.path())
        // Nothing listens here, so every request fails straight away.
        .args(["--api-url", "http://127.0.0.1:9"])
        .env_remove("PROJECT_K_API_URL")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn fresh_install_starts_on_auth() {
    let base = TempDir::new().unwrap();
    shell(&base)
        .write_stdin("where\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("> auth\n"));

    assert!(base.path().join("config").join("settings.json").exists());
}

#[test]
fn routes_that_need_a_parameter_are_refused() {
    let base = TempDir::new().unwrap();
    shell(&base)
        .write_stdin("go chat\ngo chat astrology\nwhere\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("screen 'chat' needs a parameter"))
        .stdout(predicate::str::contains("unknown subject 'astrology'"))
        .stdout(predicate::str::contains("Goodbye"));
}

#[test]
fn unknown_screens_land_on_the_placeholder() {
    let base = TempDir::new().unwrap();
    shell(&base)
        .write_stdin("go leaderboard\nwhere\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("unimplemented (leaderboard)"));
}

#[test]
fn corrupt_stored_session_is_wiped_at_startup() {
    let base = TempDir::new().unwrap();
    let config = base.path().join("config");
    fs::create_dir_all(&config).unwrap();
    let credentials = config.join("credentials.json");
    fs::write(
        &credentials,
        r#"{"access_token":"abc","user_type":"student","user":"not-json"}"#,
    )
    .unwrap();

    shell(&base)
        .write_stdin("where\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"));

    let left: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&credentials).unwrap()).unwrap();
    assert_eq!(left, serde_json::json!({}));
}

#[test]
fn end_of_input_exits_cleanly() {
    let base = TempDir::new().unwrap();
    shell(&base).write_stdin("help\n").assert().success().stdout(
        predicate::str::contains("login <email> <password>"),
    );
}

#[test]
fn failed_sign_in_is_reported_once_per_attempt() {
    let base = TempDir::new().unwrap();
    let output = shell(&base)
        .write_stdin("login ana@example.com pw\nwhere\nhelp\nlogin ana@example.com pw\nexit\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Error: Authentication failed").count(), 2);
}

#[test]
fn notes_screen_opens_with_an_empty_library() {
    let base = TempDir::new().unwrap();
    shell(&base)
        .write_stdin("go notes\nshow\nnotes filter astrology\nexit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("== My notes =="))
        .stdout(predicate::str::contains("No notes found"))
        .stdout(predicate::str::contains("unknown subject 'astrology'"));
}
