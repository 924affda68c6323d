//! Override token from the environment

use std::env::VarError;

use zeroize::Zeroizing;

use crate::credential::{Attempt, Candidate, FailureKind, FailureReason, SourceKind};
use crate::traits::CredentialSource;

type EnvLookup = Box<dyn Fn(&str) -> Result<String, VarError> + Send + Sync>;

/// Direct override token from a single environment variable.
pub struct EnvironmentSource {
    var: String,
    lookup: EnvLookup,
}

impl EnvironmentSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self::with_lookup(var, |name| std::env::var(name))
    }

    /// Constructor with a custom variable lookup (for testing)
    pub fn with_lookup(
        var: impl Into<String>,
        lookup: impl Fn(&str) -> Result<String, VarError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            var: var.into(),
            lookup: Box::new(lookup),
        }
    }
}

#[async_trait::async_trait]
impl CredentialSource for EnvironmentSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Environment
    }

    fn name(&self) -> &'static str {
        "environment variable"
    }

    async fn attempt(&self) -> Attempt {
        match (self.lookup)(&self.var) {
            Ok(value) => {
                let value = Zeroizing::new(value);
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    tracing::debug!(var = %self.var, "Override variable is blank");
                    Attempt::NotFound
                } else {
                    Attempt::Candidate(Candidate::new(trimmed, SourceKind::Environment))
                }
            }
            Err(VarError::NotPresent) => Attempt::NotFound,
            Err(VarError::NotUnicode(_)) => Attempt::Failed(FailureReason::new(
                FailureKind::ParseFailure,
                SourceKind::Environment,
                format!("{} is not valid unicode", self.var),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn source_with(value: Option<&'static str>) -> EnvironmentSource {
        EnvironmentSource::with_lookup("CLAUDE_CODE_OAUTH_TOKEN", move |_| {
            value.map(str::to_string).ok_or(VarError::NotPresent)
        })
    }

    #[tokio::test]
    async fn test_trims_whitespace() {
        match source_with(Some("  abc123  ")).attempt().await {
            Attempt::Candidate(candidate) => assert_eq!(candidate.token, "abc123"),
            other => panic!("Expected candidate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_is_not_found() {
        assert!(matches!(source_with(Some(" \t\n")).attempt().await, Attempt::NotFound));
        assert!(matches!(source_with(Some("")).attempt().await, Attempt::NotFound));
    }

    #[tokio::test]
    async fn test_unset_is_not_found() {
        assert!(matches!(source_with(None).attempt().await, Attempt::NotFound));
    }

    #[tokio::test]
    async fn test_not_unicode_is_failure() {
        let source = EnvironmentSource::with_lookup("CLAUDE_CODE_OAUTH_TOKEN", |_| {
            Err(VarError::NotUnicode(OsString::from("x")))
        });
        match source.attempt().await {
            Attempt::Failed(reason) => assert_eq!(reason.kind, FailureKind::ParseFailure),
            other => panic!("Expected failure, got {:?}", other),
        }
    }
}
