//! Resolution diagnostics and user-facing guidance
//!
//! Nothing here ever holds a token. Found credentials are reported by source
//! and length only.

use serde::Serialize;

use crate::cache::CacheStatus;
use crate::credential::{Credential, FailureKind, FailureReason, ResolutionOutcome, SourceKind};
use crate::platform::PlatformKind;

/// How a single source fared in the last walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    NotAttempted,
    Found,
    NotFound,
    Failed,
}

/// Per-source line of a [`DiagnosticsReport`]
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub name: String,
    pub attempted: bool,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_len: Option<usize>,
}

impl SourceReport {
    pub fn not_attempted(source: SourceKind, name: &str) -> Self {
        Self {
            source,
            name: name.to_string(),
            attempted: false,
            status: SourceStatus::NotAttempted,
            failure: None,
            detail: None,
            token_len: None,
        }
    }

    pub fn not_found(source: SourceKind, name: &str) -> Self {
        Self {
            attempted: true,
            status: SourceStatus::NotFound,
            ..Self::not_attempted(source, name)
        }
    }

    pub fn found(name: &str, credential: &Credential) -> Self {
        let detail = credential
            .is_session_delegate()
            .then(|| "delegates to active session".to_string());
        Self {
            attempted: true,
            status: SourceStatus::Found,
            detail,
            token_len: (!credential.is_session_delegate()).then(|| credential.token().len()),
            ..Self::not_attempted(credential.source(), name)
        }
    }

    pub fn failed(name: &str, reason: &FailureReason) -> Self {
        Self {
            attempted: true,
            status: SourceStatus::Failed,
            failure: Some(reason.kind),
            detail: Some(reason.message.clone()),
            ..Self::not_attempted(reason.origin, name)
        }
    }
}

/// Snapshot of the resolver: platform, cache state and the last source walk
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub platform: PlatformKind,
    pub cache: CacheStatus,
    pub sources: Vec<SourceReport>,
}

/// Classification of a resolution outcome for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationCategory {
    Ready,
    NotConfigured,
    AccessProblem,
    Expired,
    TimedOut,
    Malformed,
}

/// What to tell the user about an outcome
#[derive(Debug, Clone, Serialize)]
pub struct Remediation {
    pub category: RemediationCategory,
    pub user_message: String,
    pub guidance: String,
}

/// Turn an outcome into a message and next step
pub fn remediation(outcome: &ResolutionOutcome, env_var: &str) -> Remediation {
    match outcome {
        ResolutionOutcome::Found(credential) if credential.is_session_delegate() => Remediation {
            category: RemediationCategory::Ready,
            user_message: "Using the active Claude session".to_string(),
            guidance: "No token is held locally. Requests are delegated to the running session.".to_string(),
        },
        ResolutionOutcome::Found(credential) => Remediation {
            category: RemediationCategory::Ready,
            user_message: format!("Credential found in {}", credential.source()),
            guidance: "No action needed.".to_string(),
        },
        ResolutionOutcome::NotFound => Remediation {
            category: RemediationCategory::NotConfigured,
            user_message: "No credentials found in any source".to_string(),
            guidance: format!(
                "Sign in with the Claude CLI, or set {} to an OAuth token.",
                env_var
            ),
        },
        ResolutionOutcome::Error(reason) => classify_failure(reason),
    }
}

fn classify_failure(reason: &FailureReason) -> Remediation {
    match reason.kind {
        FailureKind::PermissionDenied => Remediation {
            category: RemediationCategory::AccessProblem,
            user_message: format!("Access to {} was denied", reason.origin),
            guidance: match reason.origin {
                SourceKind::NativeStore => "Unlock the keychain or allow access when prompted, then retry.".to_string(),
                _ => "Check the file permissions on your credential files.".to_string(),
            },
        },
        FailureKind::CommandUnavailable | FailureKind::CommandFailed => Remediation {
            category: RemediationCategory::AccessProblem,
            user_message: format!("The {} lookup failed", reason.origin),
            guidance: format!("{}. Set the token in the environment to bypass the secret store.", reason.message),
        },
        FailureKind::Expired => Remediation {
            category: RemediationCategory::Expired,
            user_message: "The stored credential has expired".to_string(),
            guidance: "Sign in again with the Claude CLI to refresh it.".to_string(),
        },
        FailureKind::Timeout => Remediation {
            category: RemediationCategory::TimedOut,
            user_message: format!("{} didn't respond in time", reason.origin),
            guidance: "The secret store or file system is slow or waiting on a prompt. Retry shortly.".to_string(),
        },
        FailureKind::ParseFailure | FailureKind::FileUnreadable | FailureKind::Invalid => Remediation {
            category: RemediationCategory::Malformed,
            user_message: format!("A credential in {} could not be read", reason.origin),
            guidance: format!("{}. Remove or rewrite the entry and sign in again.", reason.message),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(kind: FailureKind, origin: SourceKind) -> ResolutionOutcome {
        ResolutionOutcome::Error(FailureReason::new(kind, origin, "details"))
    }

    #[test]
    fn test_not_found_mentions_env_var() {
        let r = remediation(&ResolutionOutcome::NotFound, "CLAUDE_CODE_OAUTH_TOKEN");
        assert_eq!(r.category, RemediationCategory::NotConfigured);
        assert!(r.guidance.contains("CLAUDE_CODE_OAUTH_TOKEN"));
    }

    #[test]
    fn test_keychain_denied() {
        let r = remediation(&error(FailureKind::PermissionDenied, SourceKind::NativeStore), "X");
        assert_eq!(r.category, RemediationCategory::AccessProblem);
        assert!(r.guidance.contains("keychain"));
    }

    #[test]
    fn test_file_denied() {
        let r = remediation(&error(FailureKind::PermissionDenied, SourceKind::FileStore), "X");
        assert!(r.guidance.contains("file permissions"));
    }

    #[test]
    fn test_expired() {
        let r = remediation(&error(FailureKind::Expired, SourceKind::FileStore), "X");
        assert_eq!(r.category, RemediationCategory::Expired);
    }

    #[test]
    fn test_timeout() {
        let r = remediation(&error(FailureKind::Timeout, SourceKind::NativeStore), "X");
        assert_eq!(r.category, RemediationCategory::TimedOut);
        assert!(r.user_message.contains("native_store"));
    }

    #[test]
    fn test_parse_failure_carries_message() {
        let r = remediation(&error(FailureKind::ParseFailure, SourceKind::FileStore), "X");
        assert_eq!(r.category, RemediationCategory::Malformed);
        assert!(r.guidance.contains("details"));
    }

    #[test]
    fn test_failed_report_fields() {
        let reason = FailureReason::new(FailureKind::CommandFailed, SourceKind::NativeStore, "exit 1");
        let report = SourceReport::failed("macOS Keychain", &reason);
        assert!(report.attempted);
        assert_eq!(report.status, SourceStatus::Failed);
        assert_eq!(report.failure, Some(FailureKind::CommandFailed));
        assert_eq!(report.source, SourceKind::NativeStore);
    }

    #[test]
    fn test_not_attempted_serializes_compact() {
        let report = SourceReport::not_attempted(SourceKind::ActiveSession, "active session");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "not_attempted");
        assert!(json.get("failure").is_none());
        assert!(json.get("token_len").is_none());
    }
}
