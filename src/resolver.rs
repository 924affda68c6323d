//! Credential resolver - walks sources in priority order and caches the outcome
//!
//! The resolver owns the source list, the validator and the cache. Sources are
//! held sorted by [`SourceKind`], so priority is fixed at construction and
//! never depends on registration order.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use zeroize::Zeroize;

use crate::cache::ResolutionCache;
use crate::config::ResolverConfig;
use crate::credential::{Attempt, FailureReason, ResolutionOutcome, SourceKind};
use crate::diagnostics::{DiagnosticsReport, SourceReport};
use crate::platform::PlatformKind;
use crate::sources::{ActiveSessionSource, EnvironmentSource, FileStoreSource, NativeStoreSource};
use crate::traits::CredentialSource;
use crate::validator::TokenValidator;

/// Ordered sources for `platform`. The only place platform conditions live.
pub fn sources_for(platform: PlatformKind, config: &ResolverConfig) -> Vec<Arc<dyn CredentialSource>> {
    let mut sources: Vec<Arc<dyn CredentialSource>> =
        vec![Arc::new(EnvironmentSource::new(config.env_var.clone()))];

    match platform {
        PlatformKind::Windows => sources.push(Arc::new(NativeStoreSource::windows(config))),
        PlatformKind::MacOS => sources.push(Arc::new(NativeStoreSource::macos(config))),
        PlatformKind::Linux | PlatformKind::Unknown => {}
    }

    sources.push(Arc::new(FileStoreSource::new(
        config.credential_files.clone(),
        config.command_timeout,
    )));
    sources.push(Arc::new(ActiveSessionSource::new(
        config.session_dir.clone(),
        config.marker_extension.clone(),
        config.freshness_window,
        config.command_timeout,
    )));

    sources
}

/// Flat result for callers that only branch on token vs error.
#[derive(Clone, Default, Serialize)]
pub struct CredentialExtraction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ResolutionOutcome> for CredentialExtraction {
    fn from(outcome: &ResolutionOutcome) -> Self {
        match outcome {
            ResolutionOutcome::Found(credential) => Self {
                token: Some(credential.token().to_string()),
                source: Some(credential.source()),
                error: None,
            },
            ResolutionOutcome::NotFound => Self {
                token: None,
                source: None,
                error: Some("No credentials found in any source".to_string()),
            },
            ResolutionOutcome::Error(reason) => Self {
                token: None,
                source: Some(reason.origin),
                error: Some(reason.to_string()),
            },
        }
    }
}

impl std::fmt::Debug for CredentialExtraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialExtraction")
            .field("token", &self.token.as_ref().map(|t| format!("<redacted len={}>", t.len())))
            .field("source", &self.source)
            .field("error", &self.error)
            .finish()
    }
}

impl Drop for CredentialExtraction {
    fn drop(&mut self) {
        if let Some(token) = self.token.as_mut() {
            token.zeroize();
        }
    }
}

pub struct CredentialResolver {
    platform: PlatformKind,
    sources: Vec<Arc<dyn CredentialSource>>,
    validator: TokenValidator,
    cache: ResolutionCache,
    in_flight: tokio::sync::Mutex<()>,
    last_walk: Mutex<Vec<SourceReport>>,
}

impl CredentialResolver {
    pub fn new(
        platform: PlatformKind,
        mut sources: Vec<Arc<dyn CredentialSource>>,
        validator: TokenValidator,
        cache: ResolutionCache,
    ) -> Self {
        sources.sort_by_key(|source| source.kind());
        Self {
            platform,
            sources,
            validator,
            cache,
            in_flight: tokio::sync::Mutex::new(()),
            last_walk: Mutex::new(Vec::new()),
        }
    }

    /// Production wiring for `platform`.
    pub fn for_platform(platform: PlatformKind, config: &ResolverConfig) -> Self {
        tracing::info!(platform = %platform, "Initializing credential resolver");
        Self::new(
            platform,
            sources_for(platform, config),
            TokenValidator::new(config.min_token_len),
            ResolutionCache::new(config.cache_ttl),
        )
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform
    }

    pub fn source_kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|source| source.kind()).collect()
    }

    /// Resolve the credential, serving from cache while the entry is live.
    ///
    /// Concurrent callers queue on the in-flight lock; whoever gets it second
    /// finds the first caller's outcome in the cache and returns without
    /// touching any source.
    pub async fn resolve(&self) -> ResolutionOutcome {
        if let Some(outcome) = self.cache.get_live(Utc::now()) {
            tracing::debug!("Credential served from cache");
            return outcome;
        }

        let _guard = self.in_flight.lock().await;

        if let Some(outcome) = self.cache.get_live(Utc::now()) {
            tracing::debug!("Credential resolved by concurrent caller");
            return outcome;
        }

        let outcome = self.walk().await;
        self.cache.store(outcome.clone(), Utc::now());
        outcome
    }

    /// Public entry point: `{ token?, source?, error? }`.
    pub async fn extract_credential(&self) -> CredentialExtraction {
        CredentialExtraction::from(&self.resolve().await)
    }

    /// Forget the cached outcome; the next `resolve()` walks every source.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        let last_walk = self
            .last_walk
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let sources = if last_walk.is_empty() {
            self.sources
                .iter()
                .map(|source| SourceReport::not_attempted(source.kind(), source.name()))
                .collect()
        } else {
            last_walk
        };

        DiagnosticsReport {
            platform: self.platform,
            cache: self.cache.status(Utc::now()),
            sources,
        }
    }

    async fn walk(&self) -> ResolutionOutcome {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(self.sources.len());
        let mut found = None;
        let mut first_blocking: Option<FailureReason> = None;

        for source in &self.sources {
            if found.is_some() {
                reports.push(SourceReport::not_attempted(source.kind(), source.name()));
                continue;
            }

            let attempt_started = Instant::now();
            let attempt = source.attempt().await;
            let elapsed_ms = attempt_started.elapsed().as_millis() as u64;

            let failure = match attempt {
                Attempt::Candidate(candidate) => match self.validator.validate(candidate, Utc::now()) {
                    Ok(credential) => {
                        tracing::info!(
                            credential = %credential.redacted(),
                            expiry_unknown = credential.expiry_unknown(),
                            elapsed_ms,
                            "Credential resolved"
                        );
                        reports.push(SourceReport::found(source.name(), &credential));
                        found = Some(credential);
                        None
                    }
                    Err(reason) => Some(reason),
                },
                Attempt::NotFound => {
                    tracing::debug!(source = %source.kind(), elapsed_ms, "No credential in source");
                    reports.push(SourceReport::not_found(source.kind(), source.name()));
                    None
                }
                Attempt::Failed(reason) => Some(reason),
            };

            if let Some(reason) = failure {
                tracing::warn!(
                    source = %reason.origin,
                    kind = %reason.kind,
                    elapsed_ms,
                    "{}",
                    reason.message
                );
                reports.push(SourceReport::failed(source.name(), &reason));
                if reason.kind.is_blocking() && first_blocking.is_none() {
                    first_blocking = Some(reason);
                }
            }
        }

        *self.last_walk.lock().unwrap_or_else(PoisonError::into_inner) = reports;

        let outcome = match (found, first_blocking) {
            (Some(credential), _) => ResolutionOutcome::Found(credential),
            (None, Some(reason)) => ResolutionOutcome::Error(reason),
            (None, None) => ResolutionOutcome::NotFound,
        };

        tracing::debug!(
            found = outcome.is_found(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Source walk complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::FailureKind;
    use crate::mocks::{ScriptedSource, SourceBehavior};
    use crate::traits::MockCredentialSource;
    use std::time::Duration;

    fn build(sources: Vec<ScriptedSource>) -> CredentialResolver {
        CredentialResolver::new(
            PlatformKind::MacOS,
            sources
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn CredentialSource>)
                .collect(),
            TokenValidator::default(),
            ResolutionCache::new(Duration::from_secs(300)),
        )
    }

    #[test]
    fn test_sources_for_platforms() {
        let config = ResolverConfig::for_home("/home/test", PlatformKind::Linux);

        let kinds = |platform| {
            sources_for(platform, &config)
                .iter()
                .map(|s| s.kind())
                .collect::<Vec<_>>()
        };

        assert_eq!(kinds(PlatformKind::MacOS), SourceKind::ALL.to_vec());
        assert_eq!(kinds(PlatformKind::Windows), SourceKind::ALL.to_vec());
        assert_eq!(
            kinds(PlatformKind::Linux),
            vec![SourceKind::Environment, SourceKind::FileStore, SourceKind::ActiveSession]
        );
        assert_eq!(kinds(PlatformKind::Unknown), kinds(PlatformKind::Linux));
    }

    #[tokio::test]
    async fn test_sources_sorted_by_priority() {
        let file = ScriptedSource::token(SourceKind::FileStore, "file-token");
        let env = ScriptedSource::token(SourceKind::Environment, "env-token");
        let resolver = build(vec![file.clone(), env.clone()]);

        assert_eq!(
            resolver.source_kinds(),
            vec![SourceKind::Environment, SourceKind::FileStore]
        );
        let outcome = resolver.resolve().await;
        assert_eq!(outcome.credential().unwrap().token(), "env-token");
        assert_eq!(file.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_candidate_falls_through() {
        let env = ScriptedSource::token(SourceKind::Environment, "ab");
        let file = ScriptedSource::token(SourceKind::FileStore, "file-token");
        let resolver = build(vec![env, file]);

        let outcome = resolver.resolve().await;
        assert_eq!(outcome.credential().unwrap().source(), SourceKind::FileStore);
    }

    #[tokio::test]
    async fn test_only_invalid_results_is_not_found() {
        let env = ScriptedSource::token(SourceKind::Environment, "ab");
        let file = ScriptedSource::not_found(SourceKind::FileStore);
        let resolver = build(vec![env, file]);

        assert_eq!(resolver.resolve().await, ResolutionOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_first_blocking_error_preferred() {
        let native = ScriptedSource::failing(SourceKind::NativeStore, FailureKind::PermissionDenied);
        let file = ScriptedSource::failing(SourceKind::FileStore, FailureKind::ParseFailure);
        let session = ScriptedSource::not_found(SourceKind::ActiveSession);
        let resolver = build(vec![session, file, native]);

        match resolver.resolve().await {
            ResolutionOutcome::Error(reason) => {
                assert_eq!(reason.kind, FailureKind::PermissionDenied);
                assert_eq!(reason.origin, SourceKind::NativeStore);
            }
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_reported_when_nothing_else() {
        let file = ScriptedSource::new(
            SourceKind::FileStore,
            SourceBehavior::TokenWithExpiry(
                "tok_expired".to_string(),
                serde_json::json!("2001-01-01T00:00:00Z"),
            ),
        );
        let resolver = build(vec![file]);

        match resolver.resolve().await {
            ResolutionOutcome::Error(reason) => assert_eq!(reason.kind, FailureKind::Expired),
            other => panic!("Expected expired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_negative_outcome_cached() {
        let env = ScriptedSource::not_found(SourceKind::Environment);
        let resolver = build(vec![env.clone()]);

        assert_eq!(resolver.resolve().await, ResolutionOutcome::NotFound);
        assert_eq!(resolver.resolve().await, ResolutionOutcome::NotFound);
        assert_eq!(env.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_source_attempted_once() {
        let mut source = MockCredentialSource::new();
        source.expect_kind().return_const(SourceKind::FileStore);
        source.expect_name().return_const("mock");
        source.expect_attempt().times(1).returning(|| Attempt::NotFound);

        let resolver = CredentialResolver::new(
            PlatformKind::Linux,
            vec![Arc::new(source)],
            TokenValidator::default(),
            ResolutionCache::new(Duration::from_secs(60)),
        );

        assert_eq!(resolver.resolve().await, ResolutionOutcome::NotFound);
        assert_eq!(resolver.resolve().await, ResolutionOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_extraction_shapes() {
        let resolver = build(vec![ScriptedSource::token(SourceKind::Environment, "env-token")]);
        let extraction = resolver.extract_credential().await;
        assert_eq!(extraction.token.as_deref(), Some("env-token"));
        assert_eq!(extraction.source, Some(SourceKind::Environment));
        assert!(extraction.error.is_none());
        assert!(!format!("{:?}", extraction).contains("env-token"));

        let resolver = build(vec![ScriptedSource::not_found(SourceKind::Environment)]);
        let extraction = resolver.extract_credential().await;
        assert!(extraction.token.is_none());
        assert!(extraction.error.is_some());
    }

    #[tokio::test]
    async fn test_diagnostics_before_and_after_walk() {
        let env = ScriptedSource::not_found(SourceKind::Environment);
        let file = ScriptedSource::token(SourceKind::FileStore, "file-secret-token");
        let session = ScriptedSource::token(SourceKind::ActiveSession, "unused");
        let resolver = build(vec![env, file, session]);

        let before = resolver.diagnostics();
        assert!(before.sources.iter().all(|s| !s.attempted));

        resolver.resolve().await;
        let after = resolver.diagnostics();
        assert!(after.sources[0].attempted);
        assert!(after.sources[1].attempted);
        assert!(!after.sources[2].attempted);
        assert!(after.cache.populated);

        let json = serde_json::to_string(&after).unwrap();
        assert!(!json.contains("file-secret-token"));
    }
}
