//! OS credential manager lookups through the `keyring` crate.
//!
//! Used as the primary Windows backend (Credential Manager). `keyring` calls
//! are blocking, so each lookup runs on the blocking pool under a timeout. A
//! lookup that times out cannot be cancelled; the binary bounds how long it
//! waits for such a call at exit (see `block_on_with_grace`).

use std::time::Duration;

use keyring::Entry;

use crate::traits::{SecretStore, SecretStoreError};

pub struct KeyringSecretStore {
    timeout: Duration,
}

impl KeyringSecretStore {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn lookup(service: &str, account: &str) -> Result<Option<String>, SecretStoreError> {
    let entry = Entry::new(service, account).map_err(map_keyring_error)?;

    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(map_keyring_error(e)),
    }
}

fn map_keyring_error(err: keyring::Error) -> SecretStoreError {
    match err {
        keyring::Error::PlatformFailure(e) => SecretStoreError::Unavailable(e.to_string()),
        keyring::Error::NoStorageAccess(e) => SecretStoreError::AccessDenied(e.to_string()),
        // The payload of BadEncoding is the secret itself; never format it.
        keyring::Error::BadEncoding(_) => {
            SecretStoreError::Malformed("stored secret is not valid UTF-8".to_string())
        }
        other => SecretStoreError::CommandFailed(other.to_string()),
    }
}

#[async_trait::async_trait]
impl SecretStore for KeyringSecretStore {
    fn name(&self) -> &'static str {
        "credential-manager"
    }

    async fn retrieve(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, SecretStoreError> {
        let service_owned = service.to_string();
        let account_owned = account.to_string();
        let task = tokio::task::spawn_blocking(move || lookup(&service_owned, &account_owned));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => {
                tracing::debug!(
                    service = %service,
                    found = matches!(result, Ok(Some(_))),
                    "Credential manager lookup"
                );
                result
            }
            Ok(Err(join_error)) => Err(SecretStoreError::CommandFailed(format!(
                "credential manager lookup aborted: {}",
                join_error
            ))),
            Err(_) => {
                tracing::warn!(service = %service, "Credential manager lookup timed out");
                Err(SecretStoreError::Timeout(self.timeout))
            }
        }
    }
}
