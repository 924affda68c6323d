//! Credential files under the user's home and config directories

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

use super::parse_stored_secret;
use crate::credential::{Attempt, FailureKind, FailureReason, SourceKind};
use crate::traits::CredentialSource;

/// Checks a fixed, ordered list of JSON credential files. Missing files are
/// skipped silently; unreadable or malformed ones are remembered and the walk
/// continues.
pub struct FileStoreSource {
    paths: Vec<PathBuf>,
    timeout: Duration,
}

impl FileStoreSource {
    pub fn new(paths: Vec<PathBuf>, timeout: Duration) -> Self {
        Self { paths, timeout }
    }

    async fn scan(&self) -> Attempt {
        let mut first_failure: Option<FailureReason> = None;

        for path in &self.paths {
            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => Zeroizing::new(content),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    let kind = if e.kind() == ErrorKind::PermissionDenied {
                        FailureKind::PermissionDenied
                    } else {
                        FailureKind::FileUnreadable
                    };
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read credential file");
                    first_failure.get_or_insert_with(|| {
                        FailureReason::new(
                            kind,
                            SourceKind::FileStore,
                            format!("{}: {}", path.display(), e),
                        )
                    });
                    continue;
                }
            };

            match parse_stored_secret(&content, SourceKind::FileStore) {
                Ok(candidate) => {
                    tracing::debug!(path = %path.display(), "Credential file found");
                    return Attempt::Candidate(candidate);
                }
                Err(mut reason) => {
                    reason.message = format!("{}: {}", path.display(), reason.message);
                    tracing::warn!(error = %reason.message, "Malformed credential file");
                    first_failure.get_or_insert(reason);
                }
            }
        }

        match first_failure {
            Some(reason) => Attempt::Failed(reason),
            None => Attempt::NotFound,
        }
    }
}

#[async_trait::async_trait]
impl CredentialSource for FileStoreSource {
    fn kind(&self) -> SourceKind {
        SourceKind::FileStore
    }

    fn name(&self) -> &'static str {
        "credential files"
    }

    async fn attempt(&self) -> Attempt {
        match tokio::time::timeout(self.timeout, self.scan()).await {
            Ok(attempt) => attempt,
            Err(_) => Attempt::Failed(FailureReason::new(
                FailureKind::Timeout,
                SourceKind::FileStore,
                format!("credential file scan exceeded {:?}", self.timeout),
            )),
        }
    }
}
