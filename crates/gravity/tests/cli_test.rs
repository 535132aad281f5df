// Integration tests for the `gravity` CLI binary: argument parsing, help,
// completions, error exits, and a few round trips against a mocked portal.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const GRAVITY_VARS: &[&str] = &[
    "GRAVITY_PROFILE",
    "GRAVITY_PORTAL",
    "GRAVITY_ACCOUNT",
    "GRAVITY_CLUSTER",
    "GRAVITY_TOKEN",
    "GRAVITY_OUTPUT",
    "GRAVITY_INSECURE",
    "GRAVITY_TIMEOUT",
    "GRAVITY_USERNAME",
    "GRAVITY_PASSWORD",
    "RUST_LOG",
];

/// Build a command for the `gravity` binary with env isolation.
///
/// Clears all `GRAVITY_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn gravity_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("gravity");
    cmd.env("HOME", "/tmp/gravity-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/gravity-cli-test-nonexistent");
    for var in GRAVITY_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run the binary against `server` off the async runtime.
async fn run_against(server: &MockServer, args: &[&str]) -> std::process::Output {
    let mut cmd = gravity_cmd();
    cmd.args(["--portal", &server.uri(), "--token", "test-token"])
        .args(args);
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

/// Write a config file under a fresh XDG config home and return the dir.
fn config_home(toml: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("gravity");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), toml).unwrap();
    dir
}

fn site_json(domain: &str, state: &str) -> Value {
    json!({
        "domain": domain,
        "account_id": "a1",
        "state": state,
        "app": { "package": "gravitational.io/telekube:5.5.0" },
        "provisioner": "onprem",
        "created": "2024-03-01T12:00:00Z"
    })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = gravity_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    gravity_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("clusters")
            .and(predicate::str::contains("operations"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    gravity_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gravity"));
}

#[test]
fn test_operations_list_help_shows_filters() {
    gravity_cmd()
        .args(["operations", "list", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--active")
                .and(predicate::str::contains("--finished"))
                .and(predicate::str::contains("--last")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    gravity_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    gravity_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = gravity_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_clusters_list_without_config() {
    gravity_cmd()
        .args(["clusters", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gravity config init"));
}

#[test]
fn test_unknown_profile_exits_not_found() {
    gravity_cmd()
        .args(["--profile", "nope", "clusters", "list"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_quiet_still_reports_errors() {
    gravity_cmd()
        .args(["-q", "--profile", "nope", "clusters", "list"])
        .assert()
        .code(4)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_portal_without_credentials_exits_auth() {
    gravity_cmd()
        .args(["--portal", "https://ops.example.com:3009", "clusters", "list"])
        .assert()
        .code(3);
}

#[test]
fn test_operations_without_cluster_exits_usage() {
    gravity_cmd()
        .args([
            "--portal",
            "https://ops.example.com:3009",
            "--token",
            "t",
            "operations",
            "list",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No cluster selected"));
}

#[test]
fn test_invalid_operation_type() {
    let output = gravity_cmd()
        .args(["operations", "list", "--type", "teleport"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("possible values"));
}

#[test]
fn test_conflicting_filters_rejected() {
    gravity_cmd()
        .args(["operations", "list", "--active", "--finished"])
        .assert()
        .code(2);
}

#[test]
fn test_invalid_output_format() {
    let output = gravity_cmd()
        .args(["--output", "invalid", "clusters", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("invalid") || text.contains("possible values"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    gravity_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_profiles_empty() {
    gravity_cmd()
        .args(["config", "profiles"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No profiles configured"));
}

#[test]
fn test_config_profiles_marks_default() {
    let home = config_home(
        r#"
default_profile = "prod"

[profiles.prod]
portal = "https://ops.example.com:3009"

[profiles.stage]
portal = "https://stage.example.com:3009"
"#,
    );
    gravity_cmd()
        .env("XDG_CONFIG_HOME", home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prod *").and(predicate::str::contains("stage")));
}

// ── Against a mocked portal ─────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_clusters_list_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts/a1/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            site_json("example.com", "active"),
            site_json("stage.example.com", "installing"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(&server, &["--account", "a1", "-o", "json", "clusters", "list"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let clusters: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(clusters.as_array().unwrap().len(), 2);
    assert_eq!(clusters[1]["state"], "installing");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operations_list_sends_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts/a1/sites/example.com/operations"))
        .and(query_param("type", "operation_install"))
        .and(query_param("last", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "op-1",
            "account_id": "a1",
            "site_domain": "example.com",
            "state": "completed",
            "details": { "type": "operation_install", "state": { "profiles": {} } },
            "provisioner": "onprem",
            "created": "2024-03-01T12:00:00Z",
            "updated": "2024-03-01T12:05:00Z"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        &[
            "--account", "a1", "--cluster", "example.com", "-o", "plain",
            "operations", "list", "--type", "install", "--last",
        ],
    )
    .await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "op-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_progress_plain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/portal/v1/accounts/a1/sites/example.com/operations/common/op-1/progress",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "site_domain": "example.com",
            "operation_id": "op-1",
            "created": "2024-03-01T12:05:00Z",
            "completion": 100,
            "step": 9,
            "state": "completed",
            "message": "Operation has completed"
        })))
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        &[
            "--account", "a1", "--cluster", "example.com", "-o", "plain",
            "operations", "progress", "op-1", "--watch",
        ],
    )
    .await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "completed");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_operation_exits_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/portal/v1/accounts/a1/sites/example.com/operations/common/op-9",
        ))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "operation op-9 not found" })),
        )
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        &["--account", "a1", "--cluster", "example.com", "operations", "show", "op-9"],
    )
    .await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_profile_supplies_portal_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/portal/v1/accounts/a1/sites"))
        .and(header("authorization", "Bearer profile-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([site_json("example.com", "active")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let home = config_home(&format!(
        r#"
default_profile = "prod"

[profiles.prod]
portal = "{}"
account = "a1"
auth_mode = "bearer"
token_env = "GRAVITY_TEST_PROFILE_TOKEN"
"#,
        server.uri()
    ));

    let mut cmd = gravity_cmd();
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("GRAVITY_TEST_PROFILE_TOKEN", "profile-token")
        .args(["-o", "plain", "clusters", "list"]);
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "example.com");
}
