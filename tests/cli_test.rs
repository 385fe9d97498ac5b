//! Integration tests for the Sensei CLI
//!
//! These tests run the actual binary. HOME and XDG_CONFIG_HOME point at a
//! temp dir so a developer's own config never leaks in.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with an isolated config dir
fn sensei_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sensei").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("SENSEI_PROVIDER")
        .env_remove("SENSEI_MODEL")
        .env_remove("SENSEI_API_KEY");
    cmd
}

fn kata_root() -> TempDir {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("two-sum/tests")).unwrap();
    fs::write(root.path().join("two-sum/MISSION.md"), "Return indices of two numbers.").unwrap();
    root
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    sensei_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("hint"));
}

#[test]
fn test_check_outside_a_kata_fails() {
    let home = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    sensei_cmd(&home)
        .current_dir(scratch.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SENSEI-002"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_unknown_slug_is_not_found() {
    let home = TempDir::new().unwrap();
    let root = kata_root();
    sensei_cmd(&home)
        .args(["--root", root.path().to_str().unwrap(), "check", "three-sum"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SENSEI-001"));
}

#[test]
fn test_offline_hint_prints_fallback_and_is_rate_limited() {
    let home = TempDir::new().unwrap();
    let root = kata_root();
    let notes = TempDir::new().unwrap();
    let args = [
        "--root",
        root.path().to_str().unwrap(),
        "--notes-root",
        notes.path().to_str().unwrap(),
        "hint",
        "two-sum",
        "--offline",
        "--question",
        "where do I start?",
    ];

    sensei_cmd(&home)
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("Your Question"))
        .stdout(predicate::str::contains("where do I start?"))
        .stdout(predicate::str::contains(
            "Run the existing tests to see failures before coding.",
        ));
    assert!(notes.path().join("hints_log.json").exists());

    sensei_cmd(&home)
        .args(args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SENSEI-031"));
}

#[test]
fn test_hint_dry_run_prints_prompt() {
    let home = TempDir::new().unwrap();
    let root = kata_root();
    let notes = TempDir::new().unwrap();
    sensei_cmd(&home)
        .args([
            "--root",
            root.path().to_str().unwrap(),
            "--notes-root",
            notes.path().to_str().unwrap(),
            "hint",
            "two-sum",
            "--dry-run",
            "--question",
            "stuck",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("System:"))
        .stdout(predicate::str::contains("Return indices of two numbers."));
    assert!(!notes.path().join("hints_log.json").exists());
}

/// Config with a check command that always fails, plus extra `[hints]` lines.
///
/// dirs::config_dir honours XDG_CONFIG_HOME on Linux only.
#[cfg(target_os = "linux")]
fn write_failing_config(home: &TempDir, hints: &str) {
    let config_dir = home.path().join(".config/sensei");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        format!(
            "[check]\ncommand = [\"sh\", \"-c\", \"echo 'FAIL: test_x ... AssertionError'; exit 1\"]\n\n[hints]\n{hints}"
        ),
    )
    .unwrap();
}

#[cfg(target_os = "linux")]
#[test]
fn test_check_reports_failure_digest() {
    let home = TempDir::new().unwrap();
    let root = kata_root();
    write_failing_config(&home, "");

    sensei_cmd(&home)
        .args(["--root", root.path().to_str().unwrap(), "check", "two-sum", "--offline"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("✗ Failed"))
        .stdout(predicate::str::contains("test_x"))
        .stdout(predicate::str::contains("Diagnosis:").not());
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread")]
async fn test_check_failure_gets_diagnosis() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": { "content": "test_x asserts on the wrong index." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let root = kata_root();
    write_failing_config(
        &home,
        &format!("provider = \"ollama\"\nbase_url = \"{}\"\n", server.uri()),
    );

    let root_arg = root.path().to_str().unwrap().to_string();
    tokio::task::spawn_blocking(move || {
        sensei_cmd(&home)
            .args(["--root", &root_arg, "check", "two-sum"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Diagnosis:"))
            .stdout(predicate::str::contains("test_x asserts on the wrong index."));
    })
    .await
    .unwrap();
}

#[cfg(target_os = "linux")]
#[test]
fn test_unreachable_service_prints_fixed_diagnosis() {
    let home = TempDir::new().unwrap();
    let root = kata_root();
    // Port 9 (discard) refuses connections on a normal host
    write_failing_config(&home, "provider = \"ollama\"\nbase_url = \"http://127.0.0.1:9\"\n");

    sensei_cmd(&home)
        .args(["--root", root.path().to_str().unwrap(), "check", "two-sum"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Could not reach the reasoning service for a diagnosis.",
        ));
}
