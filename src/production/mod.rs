//! Production implementations of traits

mod command;
mod keyring_store;
mod password_vault;
mod security_cli;

pub use keyring_store::KeyringSecretStore;
pub use password_vault::PasswordVaultStore;
pub use security_cli::SecurityCliStore;
