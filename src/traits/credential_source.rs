//! The capability every credential source exposes

use crate::credential::{Attempt, SourceKind};

/// One mechanism capable of producing a token.
///
/// Sources share no mutable state and own their own I/O. Failures are reported
/// through [`Attempt::Failed`], never by panicking.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Human-readable name (e.g. "macOS Keychain")
    fn name(&self) -> &'static str;

    /// Look for a credential. Bounded by the configured timeout.
    async fn attempt(&self) -> Attempt;
}
