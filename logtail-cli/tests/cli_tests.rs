//! Integration tests for the `logtail` binary.
//!
//! Runs the compiled binary against real TOML files. No search engine is
//! needed: only configuration handling and failure exit codes are checked.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn logtail(args: &[&str]) -> Output {
    logtail_with_env(args, &[])
}

fn logtail_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_logtail"))
        .args(args)
        .env_clear()
        .envs(env.iter().copied())
        .output()
        .expect("should run logtail binary")
}

fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("logtail.toml");
    fs::write(&path, content).expect("should write config");
    path.display().to_string()
}

#[test]
fn test_print_config_merges_file_and_flags() {
    // Given: A config file with credentials
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(
        &dir,
        r#"
[search]
url = "es.internal:9243"
user = "reader"
password = "hunter2"

[query]
terms = ["level:ERROR"]
"#,
    );

    // When: Printing the effective config with a flag override
    let output = logtail(&["-c", &path, "-n", "25", "--print-config"]);

    // Then: File values, flag values and defaults are shown, password is not
    assert!(output.status.success(), "print-config should succeed");
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(stdout.contains("es.internal:9243"));
    assert!(stdout.contains("initial_entries = 25"));
    assert!(stdout.contains("follow_page_size = 9000"));
    assert!(stdout.contains("level:ERROR"));
    assert!(!stdout.contains("hunter2"), "password must be redacted");
}

#[test]
fn test_positional_terms_replace_configured_terms() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&dir, "[query]\nterms = [\"old\"]\n");

    let output = logtail(&["-c", &path, "--print-config", "new:term"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(stdout.contains("new:term"));
    assert!(!stdout.contains("\"old\""));
}

#[test]
fn test_malformed_config_exits_with_config_code() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&dir, "[search\nurl = \"x\"\n");

    let output = logtail(&["-c", &path]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration error"));
}

#[test]
fn test_missing_explicit_config_exits_with_config_code() {
    let output = logtail(&["-c", "/nonexistent/path/logtail.toml"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_values_exit_with_config_code() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&dir, "[tail]\nfollow_page_size = 50000\n");

    let output = logtail(&["-c", &path]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("follow_page_size"));
}

#[test]
fn test_unparseable_env_override_exits_with_config_code() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&dir, "");

    let output = logtail_with_env(
        &["-c", &path, "--print-config"],
        &[("LOGTAIL_TAIL_FOLLOW", "maybe")],
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty(), "config must not be printed");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("LOGTAIL_TAIL_FOLLOW"));
    assert!(stderr.contains("maybe"));
}

#[test]
fn test_flag_overrides_invalid_file_value() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&dir, "[general]\nlog_format = \"xml\"\n");

    let output = logtail(&["-c", &path, "--log-format", "json", "--print-config"]);

    assert!(output.status.success(), "flag should replace the file value");
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(stdout.contains("log_format = \"json\""));
}

#[test]
fn test_unreachable_engine_exits_with_code_3() {
    // bind and release so nothing listens on the port
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("should bind");
        listener.local_addr().expect("local addr").port()
    };
    let dir = TempDir::new().expect("should create temp dir");
    let path = write_config(&dir, "");
    let url = format!("127.0.0.1:{port}");

    let output = logtail(&["-c", &path, "-u", &url, "-l"]);

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.is_empty(), "no document lines expected");
}
