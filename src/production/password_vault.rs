//! Windows fallback: list the PasswordVault through PowerShell
//!
//! Used when the credential manager API is unavailable. The service name is
//! handed to the script through an environment variable, never spliced into
//! the script text.

use std::ffi::OsString;
use std::time::Duration;

use super::command::run_with_timeout;
use crate::traits::{SecretStore, SecretStoreError};

const SERVICE_ENV: &str = "TOKENPROBE_SERVICE";
const ACCOUNT_ENV: &str = "TOKENPROBE_ACCOUNT";

/// Exit status the script uses for "no matching entry".
const EXIT_NO_MATCH: i32 = 3;

const VAULT_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
[void][Windows.Security.Credentials.PasswordVault, Windows.Security.Credentials, ContentType = WindowsRuntime]
$vault = New-Object Windows.Security.Credentials.PasswordVault
$entries = @($vault.RetrieveAll() | Where-Object { $_.Resource -eq $env:TOKENPROBE_SERVICE })
if ($env:TOKENPROBE_ACCOUNT) {
    $preferred = @($entries | Where-Object { $_.UserName -eq $env:TOKENPROBE_ACCOUNT })
    if ($preferred.Count -gt 0) { $entries = $preferred }
}
if ($entries.Count -eq 0) { exit 3 }
$entry = $entries[0]
$entry.RetrievePassword()
[Console]::Out.Write($entry.Password)
"#;

pub struct PasswordVaultStore {
    program: OsString,
    timeout: Duration,
}

impl PasswordVaultStore {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("powershell.exe", timeout)
    }

    /// Use a different executable (for testing)
    pub fn with_program(program: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl SecretStore for PasswordVaultStore {
    fn name(&self) -> &'static str {
        "password-vault"
    }

    async fn retrieve(
        &self,
        service: &str,
        account: &str,
    ) -> Result<Option<String>, SecretStoreError> {
        let output = run_with_timeout(
            &self.program,
            &["-NoProfile", "-NonInteractive", "-Command", VAULT_SCRIPT],
            &[(SERVICE_ENV, service), (ACCOUNT_ENV, account)],
            self.timeout,
        )
        .await?;

        match output.code {
            Some(0) => {
                let secret = output.stdout.trim();
                Ok((!secret.is_empty()).then(|| secret.to_string()))
            }
            Some(EXIT_NO_MATCH) => Ok(None),
            _ if output.stderr.contains("Access is denied") => Err(
                SecretStoreError::AccessDenied("password vault refused access".to_string()),
            ),
            code => Err(SecretStoreError::CommandFailed(format!(
                "powershell exited with status {}: {}",
                code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                output.stderr_summary()
            ))),
        }
    }
}
