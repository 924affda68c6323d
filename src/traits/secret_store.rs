//! Read-only access to an OS secret store

use std::time::Duration;

use thiserror::Error;

use crate::credential::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretStoreError {
    /// The lookup mechanism does not exist on this machine.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Lookup failed: {0}")]
    CommandFailed(String),
    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed store output: {0}")]
    Malformed(String),
}

impl SecretStoreError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SecretStoreError::Unavailable(_) => FailureKind::CommandUnavailable,
            SecretStoreError::AccessDenied(_) => FailureKind::PermissionDenied,
            SecretStoreError::CommandFailed(_) => FailureKind::CommandFailed,
            SecretStoreError::Timeout(_) => FailureKind::Timeout,
            SecretStoreError::Malformed(_) => FailureKind::ParseFailure,
        }
    }

    /// Whether a secondary lookup mechanism should be tried instead.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SecretStoreError::Unavailable(_))
    }
}

/// Trait for looking up a secret by service and account name
///
/// Production: `keyring` (Windows Credential Manager), `security` CLI (macOS
/// Keychain), PowerShell PasswordVault (Windows fallback)
/// Testing: In-memory HashMap
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Short backend name for logs and diagnostics
    fn name(&self) -> &'static str;

    /// Retrieve a secret. `Ok(None)` means the entry does not exist.
    async fn retrieve(&self, service: &str, account: &str)
        -> Result<Option<String>, SecretStoreError>;
}
