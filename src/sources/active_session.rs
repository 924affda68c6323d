//! Last-resort evidence of an already-authenticated CLI session
//!
//! The Claude CLI writes `{session-uuid}.jsonl` transcripts under
//! `~/.claude/projects/<project>/`. A marker modified within the freshness
//! window means a session is live, and the caller can delegate to it instead
//! of holding a token of its own.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::credential::{Attempt, Candidate, FailureKind, FailureReason, SourceKind, SESSION_SENTINEL};
use crate::traits::CredentialSource;

pub struct ActiveSessionSource {
    session_dir: PathBuf,
    marker_extension: String,
    freshness_window: Duration,
    timeout: Duration,
}

impl ActiveSessionSource {
    pub fn new(
        session_dir: impl Into<PathBuf>,
        marker_extension: impl Into<String>,
        freshness_window: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            session_dir: session_dir.into(),
            marker_extension: marker_extension.into(),
            freshness_window,
            timeout,
        }
    }

    fn is_marker(&self, path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some(self.marker_extension.as_str())
    }

    /// Newest marker mtime in the session directory and its immediate
    /// subdirectories. Errors below the top level are skipped.
    async fn newest_marker(&self) -> std::io::Result<Option<SystemTime>> {
        let mut newest: Option<SystemTime> = None;
        let mut top = tokio::fs::read_dir(&self.session_dir).await?;

        while let Some(entry) = top.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };

            if metadata.is_dir() {
                let mut project = match tokio::fs::read_dir(&path).await {
                    Ok(rd) => rd,
                    Err(_) => continue,
                };
                while let Ok(Some(file)) = project.next_entry().await {
                    let file_path = file.path();
                    if !self.is_marker(&file_path) {
                        continue;
                    }
                    if let Ok(modified) = file.metadata().await.and_then(|m| m.modified()) {
                        newest = newest.max(Some(modified));
                    }
                }
            } else if self.is_marker(&path) {
                if let Ok(modified) = metadata.modified() {
                    newest = newest.max(Some(modified));
                }
            }
        }

        Ok(newest)
    }
}

#[async_trait::async_trait]
impl CredentialSource for ActiveSessionSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ActiveSession
    }

    fn name(&self) -> &'static str {
        "active session"
    }

    async fn attempt(&self) -> Attempt {
        let scan = tokio::time::timeout(self.timeout, self.newest_marker()).await;

        match scan {
            Ok(Ok(Some(modified))) => {
                let age = SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or(Duration::ZERO);
                if age <= self.freshness_window {
                    tracing::debug!(age_secs = age.as_secs(), "Active session detected");
                    Attempt::Candidate(Candidate::new(SESSION_SENTINEL, SourceKind::ActiveSession))
                } else {
                    tracing::debug!(age_secs = age.as_secs(), "Newest session marker is stale");
                    Attempt::NotFound
                }
            }
            Ok(Ok(None)) => Attempt::NotFound,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Attempt::NotFound,
            Ok(Err(e)) => {
                let kind = if e.kind() == ErrorKind::PermissionDenied {
                    FailureKind::PermissionDenied
                } else {
                    FailureKind::FileUnreadable
                };
                Attempt::Failed(FailureReason::new(
                    kind,
                    SourceKind::ActiveSession,
                    format!("{}: {}", self.session_dir.display(), e),
                ))
            }
            Err(_) => Attempt::Failed(FailureReason::new(
                FailureKind::Timeout,
                SourceKind::ActiveSession,
                format!("session scan exceeded {:?}", self.timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn source(dir: &Path) -> ActiveSessionSource {
        ActiveSessionSource::new(dir, "jsonl", DAY, Duration::from_secs(5))
    }

    fn write_marker(path: &Path, age: Duration) {
        fs::write(path, "{}\n").unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_recent_marker_yields_sentinel() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("-Users-test-project");
        fs::create_dir_all(&project).unwrap();
        write_marker(&project.join("session-1.jsonl"), Duration::from_secs(60));

        match source(dir.path()).attempt().await {
            Attempt::Candidate(candidate) => assert_eq!(candidate.token, SESSION_SENTINEL),
            other => panic!("Expected candidate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_marker_thirty_hours_old_not_found() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("-Users-test-project");
        fs::create_dir_all(&project).unwrap();
        write_marker(
            &project.join("session-1.jsonl"),
            Duration::from_secs(30 * 60 * 60),
        );

        assert!(matches!(source(dir.path()).attempt().await, Attempt::NotFound));
    }

    #[tokio::test]
    async fn test_newest_marker_decides() {
        let dir = TempDir::new().unwrap();
        let old_project = dir.path().join("-old");
        let new_project = dir.path().join("-new");
        fs::create_dir_all(&old_project).unwrap();
        fs::create_dir_all(&new_project).unwrap();
        write_marker(&old_project.join("a.jsonl"), Duration::from_secs(48 * 60 * 60));
        write_marker(&new_project.join("b.jsonl"), Duration::from_secs(3600));

        assert!(matches!(
            source(dir.path()).attempt().await,
            Attempt::Candidate(_)
        ));
    }

    #[tokio::test]
    async fn test_other_extensions_ignored() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("-Users-test-project");
        fs::create_dir_all(&project).unwrap();
        write_marker(&project.join("sessions-index.json"), Duration::from_secs(60));

        assert!(matches!(source(dir.path()).attempt().await, Attempt::NotFound));
    }

    #[tokio::test]
    async fn test_missing_directory_not_found() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("projects");
        assert!(matches!(source(&missing).attempt().await, Attempt::NotFound));
    }

    #[tokio::test]
    async fn test_top_level_marker_counts() {
        let dir = TempDir::new().unwrap();
        write_marker(&dir.path().join("session.jsonl"), Duration::from_secs(10));

        assert!(matches!(
            source(dir.path()).attempt().await,
            Attempt::Candidate(_)
        ));
    }
}
