//! Single-entry, time-bounded memo of the last resolution

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::credential::ResolutionOutcome;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub outcome: ResolutionOutcome,
    pub resolved_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.resolved_at
    }

    /// Live means younger than the TTL and, for a found credential, not
    /// past its own expiry.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return false;
        };
        if self.age_at(now) >= ttl {
            return false;
        }
        match &self.outcome {
            ResolutionOutcome::Found(credential) => !credential.is_expired_at(now),
            _ => true,
        }
    }
}

/// Whether the last `get_live` call was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLookup {
    Hit,
    Miss,
    /// No lookup has happened yet.
    Unused,
}

/// Snapshot of the cache for diagnostics. Holds no credential material.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub last_lookup: CacheLookup,
    pub populated: bool,
    pub live: bool,
    pub age_secs: Option<i64>,
    pub ttl_secs: u64,
}

struct CacheState {
    entry: Option<CacheEntry>,
    last_lookup: CacheLookup,
}

/// Process-wide cache owned by a resolver.
///
/// The entry is replaced or removed under a write lock, so readers see either
/// the previous entry or the new one, never a partial write.
pub struct ResolutionCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState {
                entry: None,
                last_lookup: CacheLookup::Unused,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached outcome if it is still live at `now`.
    pub fn get_live(&self, now: DateTime<Utc>) -> Option<ResolutionOutcome> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let hit = state
            .entry
            .as_ref()
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.outcome.clone());
        state.last_lookup = if hit.is_some() {
            CacheLookup::Hit
        } else {
            CacheLookup::Miss
        };
        hit
    }

    pub fn store(&self, outcome: ResolutionOutcome, resolved_at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entry = Some(CacheEntry {
            outcome,
            resolved_at,
            ttl: self.ttl,
        });
    }

    /// Drop the cached entry. No-op when empty.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.entry.take().is_some() {
            tracing::debug!("Resolution cache cleared");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entry
            .is_none()
    }

    pub fn status(&self, now: DateTime<Utc>) -> CacheStatus {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        CacheStatus {
            last_lookup: state.last_lookup,
            populated: state.entry.is_some(),
            live: state.entry.as_ref().is_some_and(|e| e.is_live_at(now)),
            age_secs: state.entry.as_ref().map(|e| e.age_at(now).num_seconds()),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
