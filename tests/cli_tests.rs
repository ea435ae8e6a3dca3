//! CLI integration tests for the jobguard binary.
//!
//! These tests run real shell commands under the runner and check the exit
//! code it maps each failure to.

#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn jobguard() -> Command {
    let mut cmd = Command::cargo_bin("jobguard").expect("binary should build");
    cmd.env_remove("DUMP_EXCEPTIONS")
        .env_remove("RUST_LOG")
        .env_remove("JOBGUARD__DUMP_EXCEPTIONS")
        .env_remove("JOBGUARD__RESCUE_RETRYABLE_ERRORS")
        .env_remove("JOBGUARD__BUCKETS__IGNORABLES")
        .env_remove("RUST_BACKTRACE")
        .env_remove("RUST_LIB_BACKTRACE");
    cmd
}

// ============================================================================
// Basic CLI
// ============================================================================

#[test]
fn test_help() {
    jobguard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run a command as a job"));
}

#[test]
fn test_version() {
    jobguard()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_command_is_required() {
    jobguard().assert().failure();
}

// ============================================================================
// Exit code mapping
// ============================================================================

#[test]
fn test_successful_command() {
    jobguard().args(["--", "true"]).assert().success();
}

#[test]
fn test_unknown_failure_keeps_child_exit_code() {
    jobguard()
        .args(["--", "sh", "-c", "exit 3"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("exit:3"));
}

#[test]
fn test_missing_program_is_unknown_io_failure() {
    jobguard()
        .args(["--", "jobguard-test-no-such-program"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("(io)"));
}

#[test]
fn test_timeout_exit_code_requests_retry() {
    jobguard()
        .args(["--", "sh", "-c", "exit 124"])
        .assert()
        .code(75)
        .stderr(predicate::str::contains("retry requested"));
}

#[test]
fn test_rescued_retryable_is_absorbed() {
    jobguard()
        .args(["--rescue-retryable", "--", "sh", "-c", "exit 124"])
        .assert()
        .success();
}

#[test]
fn test_ignorable_exit_code_is_absorbed() {
    jobguard()
        .args(["--ignore", "exit:3", "--", "sh", "-c", "exit 3"])
        .assert()
        .success();
}

#[test]
fn test_retry_flag_marks_kind_retryable() {
    jobguard()
        .args(["--retry", "exit:9", "--", "sh", "-c", "exit 9"])
        .assert()
        .code(75);
}

#[test]
fn test_unretryable_is_absorbed_and_counted() {
    jobguard()
        .args(["--unretry", "exit:4", "--metrics", "--", "sh", "-c", "exit 4"])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"unretryables\": 1"));
}

// ============================================================================
// Exception dumps
// ============================================================================

#[test]
fn test_dump_exceptions_flag() {
    jobguard()
        .args(["--dump-exceptions", "--", "sh", "-c", "exit 5"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains(
            "[ExceptionHandler] Caught unknown error: sh exited with status 5",
        ));
}

#[test]
fn test_dump_exceptions_env() {
    jobguard()
        .env("DUMP_EXCEPTIONS", "1")
        .args(["--", "sh", "-c", "exit 5"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("[ExceptionHandler] Caught unknown error"));
}

#[test]
fn test_no_dump_by_default() {
    jobguard()
        .args(["--", "sh", "-c", "exit 5"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("[ExceptionHandler]").not())
        .stderr(predicate::str::contains("[ExceptionHandler]").not());
}

#[test]
fn test_dump_includes_backtrace_frames() {
    jobguard()
        .env("RUST_LIB_BACKTRACE", "1")
        .args(["--dump-exceptions", "--", "sh", "-c", "exit 5"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("[ExceptionHandler] Caught unknown error"))
        .stdout(predicate::str::contains("[ExceptionHandler] 0: "));
}

#[test]
fn test_metrics_markdown_report() {
    jobguard()
        .args(["--unretry", "exit:4", "--metrics", "--metrics-format", "markdown"])
        .args(["--", "sh", "-c", "exit 4"])
        .assert()
        .success()
        .stderr(predicate::str::contains("## Exception Metrics"))
        .stderr(predicate::str::contains("- **unretryables**: 1"))
        .stderr(predicate::str::contains("- **Most common kind**: `exit:4`"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_env_bucket_list() {
    jobguard()
        .env("JOBGUARD__BUCKETS__IGNORABLES", "exit:6,exit:7")
        .args(["--", "sh", "-c", "exit 7"])
        .assert()
        .success();
}

#[test]
fn test_config_file_buckets() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("jobguard.toml");
    std::fs::write(&path, "[buckets]\nignorables = [\"exit:6\"]\n")
        .expect("Failed to write config");

    jobguard()
        .arg("--config")
        .arg(&path)
        .args(["--", "sh", "-c", "exit 6"])
        .assert()
        .success();
}

#[test]
fn test_config_file_with_bogus_bucket() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("jobguard.toml");
    std::fs::write(&path, "[buckets]\nbogus = [\"exit:6\"]\n")
        .expect("Failed to write config");

    jobguard()
        .arg("--config")
        .arg(&path)
        .args(["--", "true"])
        .assert()
        .code(78)
        .stderr(predicate::str::contains("Invalid error category: bogus."));
}

#[test]
fn test_missing_config_file() {
    jobguard()
        .args(["--config", "/nonexistent/jobguard.toml", "--", "true"])
        .assert()
        .code(78);
}
