//! OS secret store source (Windows Credential Manager / macOS Keychain)
//!
//! Candidate service names are tried in a fixed order and the first secret
//! that parses as a credential document wins. When the primary backend reports
//! that it is unavailable, the optional fallback backend takes over for the
//! remaining names.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::parse_stored_secret;
use crate::config::ResolverConfig;
use crate::credential::{Attempt, Candidate, FailureKind, FailureReason, SourceKind};
use crate::production::{KeyringSecretStore, PasswordVaultStore, SecurityCliStore};
use crate::traits::{CredentialSource, SecretStore, SecretStoreError};

pub struct NativeStoreSource {
    name: &'static str,
    primary: Arc<dyn SecretStore>,
    fallback: Option<Arc<dyn SecretStore>>,
    service_names: Vec<String>,
    account: String,
    min_secret_len: Option<usize>,
}

impl NativeStoreSource {
    pub fn new(
        name: &'static str,
        primary: Arc<dyn SecretStore>,
        service_names: Vec<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            name,
            primary,
            fallback: None,
            service_names,
            account: account.into(),
            min_secret_len: None,
        }
    }

    /// Secondary backend used once the primary reports it is unavailable.
    pub fn with_fallback(mut self, fallback: Arc<dyn SecretStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Reject stored tokens shorter than `len` characters.
    pub fn with_min_secret_len(mut self, len: usize) -> Self {
        self.min_secret_len = Some(len);
        self
    }

    /// Credential Manager through `keyring`, PasswordVault listing as fallback.
    pub fn windows(config: &ResolverConfig) -> Self {
        Self::new(
            "Windows Credential Manager",
            Arc::new(KeyringSecretStore::new(config.command_timeout)),
            config.service_names.clone(),
            config.account.clone(),
        )
        .with_fallback(Arc::new(PasswordVaultStore::new(config.command_timeout)))
    }

    /// Keychain through the `security` tool, with a minimum secret length.
    pub fn macos(config: &ResolverConfig) -> Self {
        Self::new(
            "macOS Keychain",
            Arc::new(SecurityCliStore::new(config.command_timeout)),
            config.service_names.clone(),
            config.account.clone(),
        )
        .with_min_secret_len(config.min_keychain_secret_len)
    }

    fn parse_secret(&self, service: &str, secret: &str) -> Result<Candidate, FailureReason> {
        let candidate = parse_stored_secret(secret, SourceKind::NativeStore).map_err(|mut reason| {
            reason.message = format!("entry '{}': {}", service, reason.message);
            reason
        })?;

        if let Some(min) = self.min_secret_len {
            if candidate.token.trim().chars().count() < min {
                return Err(FailureReason::new(
                    FailureKind::ParseFailure,
                    SourceKind::NativeStore,
                    format!("entry '{}' holds a token shorter than {} characters", service, min),
                ));
            }
        }

        Ok(candidate)
    }

    fn store_failure(store: &dyn SecretStore, service: &str, err: &SecretStoreError) -> FailureReason {
        FailureReason::new(
            err.failure_kind(),
            SourceKind::NativeStore,
            format!("{} lookup of '{}': {}", store.name(), service, err),
        )
    }
}

#[async_trait::async_trait]
impl CredentialSource for NativeStoreSource {
    fn kind(&self) -> SourceKind {
        SourceKind::NativeStore
    }

    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self) -> Attempt {
        let mut store = Arc::clone(&self.primary);
        let mut on_fallback = false;
        let mut first_failure: Option<FailureReason> = None;

        for service in &self.service_names {
            let mut result = store.retrieve(service, &self.account).await;

            let unavailable = matches!(&result, Err(err) if err.is_unavailable());
            if unavailable && !on_fallback {
                if let Some(fallback) = &self.fallback {
                    tracing::info!(
                        primary = store.name(),
                        fallback = fallback.name(),
                        "Primary secret store unavailable, switching to fallback"
                    );
                    store = Arc::clone(fallback);
                    on_fallback = true;
                    result = store.retrieve(service, &self.account).await;
                }
            }

            match result {
                Ok(None) => {
                    tracing::debug!(store = store.name(), service = %service, "No entry");
                }
                Ok(Some(secret)) => {
                    let secret = Zeroizing::new(secret);
                    match self.parse_secret(service, &secret) {
                        Ok(candidate) => {
                            tracing::debug!(store = store.name(), service = %service, "Entry found");
                            return Attempt::Candidate(candidate);
                        }
                        Err(reason) => {
                            tracing::warn!(store = store.name(), service = %service, error = %reason.message, "Unusable entry");
                            first_failure.get_or_insert(reason);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(store = store.name(), service = %service, error = %err, "Secret store lookup failed");
                    first_failure.get_or_insert_with(|| Self::store_failure(store.as_ref(), service, &err));
                    // Further names would hit the same wall (and the same timeout).
                    if matches!(
                        err,
                        SecretStoreError::Unavailable(_)
                            | SecretStoreError::Timeout(_)
                            | SecretStoreError::AccessDenied(_)
                    ) {
                        break;
                    }
                }
            }
        }

        match first_failure {
            Some(reason) => Attempt::Failed(reason),
            None => Attempt::NotFound,
        }
    }
}
