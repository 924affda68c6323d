//! Subprocess invocation bounded by a timeout
//!
//! The child is spawned with `kill_on_drop`, so when the timeout fires and the
//! output future is dropped the process is killed rather than left running.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::traits::SecretStoreError;

#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// First stderr line, for error messages. Store tools never echo the
    /// secret on stderr.
    pub fn stderr_summary(&self) -> &str {
        self.stderr.lines().next().unwrap_or("").trim()
    }
}

pub(crate) async fn run_with_timeout(
    program: &OsStr,
    args: &[&str],
    envs: &[(&str, &str)],
    timeout: Duration,
) -> Result<CommandOutput, SecretStoreError> {
    let started = Instant::now();
    let mut command = Command::new(program);
    command
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program_name = program.to_string_lossy();
    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(match e.kind() {
                ErrorKind::NotFound => {
                    SecretStoreError::Unavailable(format!("{} not found", program_name))
                }
                ErrorKind::PermissionDenied => SecretStoreError::AccessDenied(format!(
                    "not permitted to run {}",
                    program_name
                )),
                _ => SecretStoreError::CommandFailed(format!(
                    "{} failed to launch: {}",
                    program_name, e
                )),
            });
        }
        Err(_) => {
            tracing::warn!(
                program = %program_name,
                timeout_ms = timeout.as_millis() as u64,
                "Secret store command timed out"
            );
            return Err(SecretStoreError::Timeout(timeout));
        }
    };

    tracing::debug!(
        program = %program_name,
        code = ?output.status.code(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Secret store command finished"
    );

    Ok(CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
