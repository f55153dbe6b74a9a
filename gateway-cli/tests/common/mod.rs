// Each integration test file is compiled as its own binary crate, each
// pulling in its own copy of this module. Helpers used by some test
// binaries but not others trigger false "dead code" warnings in the
// binaries that don't call them.
#![allow(dead_code)]

pub mod server;

use std::path::PathBuf;
use std::process::{Command, Output};

/// Result of running the grpc-gateway binary to completion.
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl RunResult {
    fn from_output(output: Output) -> Self {
        RunResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }

    /// Combined stdout + stderr.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Path to the compiled grpc-gateway binary (set by Cargo for [[bin]]
/// targets).
pub fn gateway_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_grpc-gateway"))
}

/// Path to the demo backend's proto directory, shared with the gateway so
/// both sides agree on the service definitions.
pub fn proto_dir() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../testing/greeterdemo/proto")
        .to_string_lossy()
        .into_owned()
}

/// Run the grpc-gateway binary with the given arguments until it exits.
pub fn run(args: &[&str]) -> RunResult {
    let output = Command::new(gateway_bin())
        .args(args)
        .output()
        .expect("failed to execute grpc-gateway binary");
    RunResult::from_output(output)
}

// -- Assertion helpers --------------------------------------------------------

/// Assert the exit code matches.
pub fn assert_exit_code(result: &RunResult, expected: i32) {
    assert_eq!(
        result.exit_code, expected,
        "Expected exit code {expected}, got {}.\nstdout: {}\nstderr: {}",
        result.exit_code, result.stdout, result.stderr,
    );
}

/// Assert combined output (stdout+stderr) contains a substring
/// (case-insensitive).
pub fn assert_output_contains(result: &RunResult, needle: &str) {
    let combined = result.combined().to_lowercase();
    assert!(
        combined.contains(&needle.to_lowercase()),
        "Expected output to contain {needle:?} (case-insensitive).\nstdout: {}\nstderr: {}",
        result.stdout,
        result.stderr,
    );
}
