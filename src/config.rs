//! Resolver configuration
//!
//! Defaults mirror where the Claude CLI keeps its credentials. Everything is a
//! plain value so tests can point the resolver at temporary directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::platform::PlatformKind;

pub const DEFAULT_ENV_VAR: &str = "CLAUDE_CODE_OAUTH_TOKEN";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
/// How long the binary waits for abandoned blocking lookups at exit.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
pub const DEFAULT_MIN_TOKEN_LEN: usize = 4;
pub const DEFAULT_MIN_KEYCHAIN_SECRET_LEN: usize = 10;

/// Native store service names, tried in this order.
pub const DEFAULT_SERVICE_NAMES: &[&str] = &[
    "Claude Code-credentials",
    "Claude Code",
    "claude-code",
    "claude-code-credentials",
];

const TTL_OVERRIDE_VAR: &str = "TOKENPROBE_CACHE_TTL_SECS";
const TIMEOUT_OVERRIDE_VAR: &str = "TOKENPROBE_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDirectory,
    #[error("Invalid value for {name}: {value}")]
    InvalidOverride { name: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Environment variable holding a direct override token.
    pub env_var: String,
    pub cache_ttl: Duration,
    /// Upper bound for each subprocess call and file scan.
    pub command_timeout: Duration,
    pub min_token_len: usize,
    pub min_keychain_secret_len: usize,
    pub service_names: Vec<String>,
    /// Account name used for native store lookups.
    pub account: String,
    pub credential_files: Vec<PathBuf>,
    pub session_dir: PathBuf,
    /// File extension of session marker files.
    pub marker_extension: String,
    pub freshness_window: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            env_var: DEFAULT_ENV_VAR.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            min_keychain_secret_len: DEFAULT_MIN_KEYCHAIN_SECRET_LEN,
            service_names: DEFAULT_SERVICE_NAMES.iter().map(|s| s.to_string()).collect(),
            account: current_user(),
            credential_files: Vec::new(),
            session_dir: PathBuf::new(),
            marker_extension: "jsonl".to_string(),
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }
}

impl ResolverConfig {
    /// Build the default layout rooted at `home`.
    pub fn for_home(home: impl AsRef<Path>, platform: PlatformKind) -> Self {
        let home = home.as_ref();
        let mut credential_files = vec![
            home.join(".claude").join(".credentials.json"),
            home.join(".claude").join("credentials.json"),
            home.join(".config").join("claude").join("credentials.json"),
            home.join(".config").join("claude-code").join("credentials.json"),
        ];

        if platform == PlatformKind::Windows {
            if let Ok(appdata) = std::env::var("APPDATA") {
                credential_files.push(PathBuf::from(appdata).join("claude").join("credentials.json"));
            }
        }

        Self {
            credential_files,
            session_dir: home.join(".claude").join("projects"),
            ..Self::default()
        }
    }

    /// Locate the home directory and apply environment overrides.
    pub fn from_env(platform: PlatformKind) -> Result<Self, ConfigError> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDirectory)?;

        let mut config = Self::for_home(home, platform);

        if let Some(ttl) = read_secs_override(TTL_OVERRIDE_VAR)? {
            config.cache_ttl = ttl;
        }
        if let Some(timeout) = read_secs_override(TIMEOUT_OVERRIDE_VAR)? {
            config.command_timeout = timeout;
        }

        config.validate()?;
        tracing::debug!(
            ttl_secs = config.cache_ttl.as_secs(),
            timeout_secs = config.command_timeout.as_secs(),
            files = config.credential_files.len(),
            "Resolver config loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("cache_ttl"));
        }
        if self.command_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("command_timeout"));
        }
        if self.freshness_window.is_zero() {
            return Err(ConfigError::ZeroDuration("freshness_window"));
        }
        Ok(())
    }
}

fn read_secs_override(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidOverride { name, value }),
        Err(_) => Ok(None),
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
