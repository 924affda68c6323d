//! Credential value types and the resolution outcome taxonomy
//!
//! A [`Credential`] never prints its token: `Debug` is hand-written and the
//! [`Redacted`] wrapper is what log statements use.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Marker token returned by the active-session source. It is not a secret;
/// it tells the caller to delegate to the already-authenticated session.
pub const SESSION_SENTINEL: &str = "__active_session__";

/// Where a credential came from.
///
/// The derived `Ord` is the resolution priority: lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Environment,
    NativeStore,
    FileStore,
    ActiveSession,
}

impl SourceKind {
    /// All kinds in priority order.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Environment,
        SourceKind::NativeStore,
        SourceKind::FileStore,
        SourceKind::ActiveSession,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Environment => "environment",
            SourceKind::NativeStore => "native_store",
            SourceKind::FileStore => "file_store",
            SourceKind::ActiveSession => "active_session",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated credential.
///
/// Only the validator builds these. The token is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    token: String,
    #[zeroize(skip)]
    source: SourceKind,
    #[zeroize(skip)]
    expires_at: Option<DateTime<Utc>>,
    #[zeroize(skip)]
    expiry_unknown: bool,
}

impl Credential {
    pub(crate) fn new(
        token: String,
        source: SourceKind,
        expires_at: Option<DateTime<Utc>>,
        expiry_unknown: bool,
    ) -> Self {
        Self {
            token,
            source,
            expires_at,
            expiry_unknown,
        }
    }

    /// The raw token. Callers must not log this.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Expiry metadata was present but could not be parsed.
    pub fn expiry_unknown(&self) -> bool {
        self.expiry_unknown
    }

    /// True for the active-session marker rather than a real token.
    pub fn is_session_delegate(&self) -> bool {
        self.token == SESSION_SENTINEL
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Loggable view: source and token length only.
    pub fn redacted(&self) -> Redacted<'_> {
        Redacted(self)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &format_args!("<redacted len={}>", self.token.len()))
            .field("source", &self.source)
            .field("expires_at", &self.expires_at)
            .field("expiry_unknown", &self.expiry_unknown)
            .finish()
    }
}

/// Display adapter used wherever a credential is logged.
pub struct Redacted<'a>(&'a Credential);

impl std::fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_session_delegate() {
            write!(f, "{}:session-delegate", self.0.source)
        } else {
            write!(f, "{}:len={}", self.0.source, self.0.token.len())
        }
    }
}

/// Unvalidated token material produced by a source adapter.
pub struct Candidate {
    pub(crate) token: String,
    pub(crate) origin: SourceKind,
    pub(crate) expires_at: Option<serde_json::Value>,
}

impl Candidate {
    pub fn new(token: impl Into<String>, origin: SourceKind) -> Self {
        Self {
            token: token.into(),
            origin,
            expires_at: None,
        }
    }

    /// Attach raw expiry metadata exactly as the store held it.
    pub fn with_expiry(mut self, raw: serde_json::Value) -> Self {
        if !raw.is_null() {
            self.expires_at = Some(raw);
        }
        self
    }

    pub fn origin(&self) -> SourceKind {
        self.origin
    }
}

impl Drop for Candidate {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("token", &format_args!("<redacted len={}>", self.token.len()))
            .field("origin", &self.origin)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of asking a single source.
#[derive(Debug)]
pub enum Attempt {
    Candidate(Candidate),
    NotFound,
    Failed(FailureReason),
}

/// Category of a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CommandUnavailable,
    CommandFailed,
    FileUnreadable,
    ParseFailure,
    PermissionDenied,
    Timeout,
    Expired,
    /// Token present but rejected by shape rules (blank, too short).
    Invalid,
}

impl FailureKind {
    /// Blocking failures win over `NotFound` in the aggregate outcome.
    pub fn is_blocking(self) -> bool {
        !matches!(self, FailureKind::Invalid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::CommandUnavailable => "command_unavailable",
            FailureKind::CommandFailed => "command_failed",
            FailureKind::FileUnreadable => "file_unreadable",
            FailureKind::ParseFailure => "parse_failure",
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::Timeout => "timeout",
            FailureKind::Expired => "expired",
            FailureKind::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a source could not produce a credential. The message is safe to show.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{origin}: {kind}: {message}")]
pub struct FailureReason {
    pub kind: FailureKind,
    pub origin: SourceKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, origin: SourceKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

/// Final result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Found(Credential),
    /// Every source was consulted and none held a usable credential.
    NotFound,
    Error(FailureReason),
}

impl ResolutionOutcome {
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            ResolutionOutcome::Found(credential) => Some(credential),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionOutcome::Found(_))
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            ResolutionOutcome::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut kinds = vec![
            SourceKind::ActiveSession,
            SourceKind::FileStore,
            SourceKind::Environment,
            SourceKind::NativeStore,
        ];
        kinds.sort();
        assert_eq!(kinds, SourceKind::ALL.to_vec());
    }

    #[test]
    fn test_debug_never_shows_token() {
        let credential = Credential::new(
            "sk-ant-oat01-supersecret".to_string(),
            SourceKind::FileStore,
            None,
            false,
        );

        let debug = format!("{:?}", credential);
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("len=24"));

        let redacted = credential.redacted().to_string();
        assert_eq!(redacted, "file_store:len=24");
    }

    #[test]
    fn test_session_delegate_redaction() {
        let credential = Credential::new(
            SESSION_SENTINEL.to_string(),
            SourceKind::ActiveSession,
            None,
            false,
        );
        assert!(credential.is_session_delegate());
        assert_eq!(credential.redacted().to_string(), "active_session:session-delegate");
    }

    #[test]
    fn test_candidate_debug_redacted() {
        let candidate = Candidate::new("hunter2hunter2", SourceKind::Environment);
        assert!(!format!("{:?}", candidate).contains("hunter2"));
    }

    #[test]
    fn test_failure_display() {
        let reason = FailureReason::new(
            FailureKind::CommandFailed,
            SourceKind::NativeStore,
            "security exited with status 1",
        );
        assert_eq!(
            reason.to_string(),
            "native_store: command_failed: security exited with status 1"
        );
        assert!(reason.kind.is_blocking());
        assert!(!FailureKind::Invalid.is_blocking());
    }

    #[test]
    fn test_null_expiry_ignored() {
        let candidate =
            Candidate::new("abcdef", SourceKind::FileStore).with_expiry(serde_json::Value::Null);
        assert!(candidate.expires_at.is_none());
    }
}
