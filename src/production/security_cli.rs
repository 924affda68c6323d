//! macOS Keychain lookups via the `security` command-line tool

use std::ffi::OsString;
use std::time::Duration;

use super::command::run_with_timeout;
use crate::traits::{SecretStore, SecretStoreError};

/// `errSecItemNotFound` as reported by `security`'s exit status.
const EXIT_ITEM_NOT_FOUND: i32 = 44;
/// `errSecAuthFailed` / user canceled the unlock prompt.
const EXIT_AUTH_FAILED: i32 = 51;
const EXIT_USER_CANCELED: i32 = 128;

pub struct SecurityCliStore {
    program: OsString,
    timeout: Duration,
}

impl SecurityCliStore {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("/usr/bin/security", timeout)
    }

    /// Use a different executable (for testing)
    pub fn with_program(program: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl SecretStore for SecurityCliStore {
    fn name(&self) -> &'static str {
        "macos-keychain"
    }

    async fn retrieve(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, SecretStoreError> {
        let mut args = vec!["find-generic-password", "-s", service];
        if !account.is_empty() {
            args.push("-a");
            args.push(account);
        }
        args.push("-w");

        let output = run_with_timeout(&self.program, &args, &[], self.timeout).await?;

        match output.code {
            Some(0) => {
                let secret = output.stdout.trim_end_matches(['\r', '\n']);
                if secret.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(secret.to_string()))
                }
            }
            Some(EXIT_ITEM_NOT_FOUND) => Ok(None),
            Some(EXIT_AUTH_FAILED) | Some(EXIT_USER_CANCELED) => Err(
                SecretStoreError::AccessDenied(format!("keychain refused access to {}", service)),
            ),
            _ if output.stderr.contains("could not be found") => Ok(None),
            _ if output.stderr.contains("interaction is not allowed") => {
                Err(SecretStoreError::AccessDenied("keychain is locked".to_string()))
            }
            code => Err(SecretStoreError::CommandFailed(format!(
                "security exited with status {}: {}",
                code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                output.stderr_summary()
            ))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("security");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_returns_secret() {
        let dir = TempDir::new().unwrap();
        let store = SecurityCliStore::with_program(
            script(&dir, r#"echo '{"oauth_token":"sk-test-123456"}'"#),
            Duration::from_secs(5),
        );

        let secret = store.retrieve("Claude Code", "tester").await.unwrap();
        assert_eq!(secret.as_deref(), Some(r#"{"oauth_token":"sk-test-123456"}"#));
    }

    #[tokio::test]
    async fn test_item_not_found() {
        let dir = TempDir::new().unwrap();
        let store = SecurityCliStore::with_program(script(&dir, "exit 44"), Duration::from_secs(5));

        assert_eq!(store.retrieve("Claude Code", "tester").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        let dir = TempDir::new().unwrap();
        let store = SecurityCliStore::with_program(
            script(&dir, "echo 'boom' >&2; exit 1"),
            Duration::from_secs(5),
        );

        let err = store.retrieve("Claude Code", "tester").await.unwrap_err();
        assert!(matches!(err, SecretStoreError::CommandFailed(ref m) if m.contains("boom")));
    }

    #[tokio::test]
    async fn test_locked_keychain_is_denied() {
        let dir = TempDir::new().unwrap();
        let store = SecurityCliStore::with_program(
            script(&dir, "echo 'User interaction is not allowed.' >&2; exit 36"),
            Duration::from_secs(5),
        );

        let err = store.retrieve("Claude Code", "").await.unwrap_err();
        assert!(matches!(err, SecretStoreError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let store =
            SecurityCliStore::with_program("/nonexistent/security", Duration::from_secs(5));
        let err = store.retrieve("Claude Code", "").await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
