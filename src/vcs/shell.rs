// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process execution for VCS adapters.
//!
//! Commands are invoked with argument vectors, never shell strings, so paths
//! with spaces or metacharacters need no quoting. Invocations never error on
//! a non-zero exit: callers get the exit code and raw stderr back and branch
//! on those. A failure to spawn the process at all is folded into the same
//! shape with exit code 127.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::trace;

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stdout.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Run a command with arguments in the given directory.
pub async fn run(program: &str, args: &[&str], cwd: &Path) -> CommandOutput {
    trace!("exec: {} {:?} (cwd {:?})", program, args, cwd);

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) => CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        },
        Err(e) => CommandOutput {
            exit_code: 127,
            stdout: String::new(),
            stderr: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = run("echo", &["hello"], &PathBuf::from(".")).await;
        assert!(output.success());
        assert_eq!(output.stdout_trimmed(), "hello");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_is_not_an_error() {
        let output = run("false", &[], &PathBuf::from(".")).await;
        assert!(!output.success());
        assert_eq!(output.exit_code, 1);
    }

    #[tokio::test]
    async fn test_run_missing_program_folds_into_output() {
        let output = run("definitely-not-a-real-binary", &[], &PathBuf::from(".")).await;
        assert_eq!(output.exit_code, 127);
        assert!(!output.stderr.is_empty());
    }
}
