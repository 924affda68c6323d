//! Test doubles for dependency injection
//!
//! In-memory implementations of the secret store and a scripted credential
//! source with call counting, for exercising the resolver without an OS store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::credential::{Attempt, Candidate, FailureKind, FailureReason, SourceKind};
use crate::traits::{CredentialSource, SecretStore, SecretStoreError};

// ============================================================================
// InMemorySecretStore
// ============================================================================

/// In-memory secret store for testing
///
/// Thread-safe storage keyed by service name. No actual keychain interaction.
#[derive(Clone, Default)]
pub struct InMemorySecretStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store with pre-populated entries
    pub fn with_entries(entries: Vec<(&str, &str)>) -> Self {
        let store = Self::new();
        for (service, secret) in entries {
            store.insert(service, secret);
        }
        store
    }

    pub fn insert(&self, service: &str, secret: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(service.to_string(), secret.to_string());
    }

    /// Number of `retrieve` calls made (for assertions)
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SecretStore for InMemorySecretStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn retrieve(
        &self,
        service: &str,
        _account: &str,
    ) -> Result<Option<String>, SecretStoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().unwrap().get(service).cloned())
    }
}

// ============================================================================
// ScriptedSource
// ============================================================================

/// What a [`ScriptedSource`] reports on each attempt
#[derive(Debug, Clone)]
pub enum SourceBehavior {
    Token(String),
    TokenWithExpiry(String, serde_json::Value),
    NotFound,
    Fail(FailureKind),
}

/// Credential source with a fixed answer and call counting
///
/// Clones share the counter, so a test can keep a handle after handing the
/// source to a resolver.
#[derive(Clone)]
pub struct ScriptedSource {
    kind: SourceKind,
    behavior: Arc<Mutex<SourceBehavior>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind, behavior: SourceBehavior) -> Self {
        Self {
            kind,
            behavior: Arc::new(Mutex::new(behavior)),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn token(kind: SourceKind, token: &str) -> Self {
        Self::new(kind, SourceBehavior::Token(token.to_string()))
    }

    pub fn not_found(kind: SourceKind) -> Self {
        Self::new(kind, SourceBehavior::NotFound)
    }

    pub fn failing(kind: SourceKind, failure: FailureKind) -> Self {
        Self::new(kind, SourceBehavior::Fail(failure))
    }

    /// Sleep this long inside every attempt (simulates a slow subprocess)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Change the answer for subsequent attempts
    pub fn set_behavior(&self, behavior: SourceBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Get number of attempts made
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn attempt(&self) -> Attempt {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            SourceBehavior::Token(token) => Attempt::Candidate(Candidate::new(token, self.kind)),
            SourceBehavior::TokenWithExpiry(token, expiry) => {
                Attempt::Candidate(Candidate::new(token, self.kind).with_expiry(expiry))
            }
            SourceBehavior::NotFound => Attempt::NotFound,
            SourceBehavior::Fail(kind) => Attempt::Failed(FailureReason::new(
                kind,
                self.kind,
                format!("scripted {} failure", kind),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
