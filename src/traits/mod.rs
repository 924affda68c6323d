//! Trait definitions for dependency injection
//!
//! Every OS-facing dependency sits behind a trait so the resolver can be
//! tested without touching a real keychain.

mod credential_source;
mod secret_store;

pub use credential_source::CredentialSource;
pub use secret_store::{SecretStore, SecretStoreError};

#[cfg(test)]
pub use credential_source::MockCredentialSource;
#[cfg(test)]
pub use secret_store::MockSecretStore;
