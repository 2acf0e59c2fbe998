//! Common utilities for CLI E2E tests.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Invoke a CLI command with `home` as the home directory and return
/// (stdout, stderr, exit code).
pub fn run_cli(home: &Path, args: &[&str], stdin: &str) -> (String, String, i32) {
    run_cli_with_env(home, args, stdin, &[])
}

/// Like [`run_cli`], with extra environment variables for the binary.
pub fn run_cli_with_env(
    home: &Path,
    args: &[&str],
    stdin: &str,
    envs: &[(&str, &str)],
) -> (String, String, i32) {
    let mut child = Command::new("cargo")
        .args(["run", "-q", "-p", "speakerlight-cli", "--"])
        .args(args)
        .env("HOME", home)
        .env_remove("SPEAKERLIGHT_ENV")
        .env_remove("RUST_LOG")
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI command");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("Failed to write stdin");

    let output = child.wait_with_output().expect("Failed to wait for CLI");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Invoke a CLI command and expect success.
pub fn run_cli_success(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args, "");
    assert_eq!(code, 0, "CLI command failed: {args:?}\n{stderr}");
    stdout
}

/// Invoke a CLI command and expect failure, returning stderr.
pub fn run_cli_failure(home: &Path, args: &[&str]) -> String {
    let (_, stderr, code) = run_cli(home, args, "");
    assert_ne!(code, 0, "CLI command unexpectedly succeeded: {args:?}");
    stderr
}
