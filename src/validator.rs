//! Shape and expiry checks that turn a [`Candidate`] into a [`Credential`]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::credential::{Candidate, Credential, FailureKind, FailureReason, SESSION_SENTINEL};

/// Epoch values above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Clone)]
pub struct TokenValidator {
    min_len: usize,
}

impl TokenValidator {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    /// Validate a candidate against the clock `now`.
    ///
    /// Rules run in order: blank, minimum length (the session sentinel is
    /// exempt), expiry parsing, expiry in the past. Unparsable expiry is not a
    /// rejection; the credential is returned with `expiry_unknown` set.
    pub fn validate(
        &self,
        mut candidate: Candidate,
        now: DateTime<Utc>,
    ) -> Result<Credential, FailureReason> {
        let origin = candidate.origin;
        let trimmed = candidate.token.trim();
        let needs_trim = trimmed.len() != candidate.token.len();

        if trimmed.is_empty() {
            return Err(FailureReason::new(
                FailureKind::Invalid,
                origin,
                "token is empty",
            ));
        }

        if trimmed != SESSION_SENTINEL && trimmed.chars().count() < self.min_len {
            return Err(FailureReason::new(
                FailureKind::Invalid,
                origin,
                format!("token shorter than {} characters", self.min_len),
            ));
        }

        let (expires_at, expiry_unknown) = match candidate.expires_at.take() {
            None => (None, false),
            Some(raw) => match parse_expiry(&raw) {
                Some(at) => (Some(at), false),
                None => {
                    tracing::warn!(source = %origin, "Ignoring unparsable expiry metadata");
                    (None, true)
                }
            },
        };

        if let Some(at) = expires_at {
            if at <= now {
                return Err(FailureReason::new(
                    FailureKind::Expired,
                    origin,
                    format!("credential expired at {}", at.to_rfc3339()),
                ));
            }
        }

        let token = if needs_trim {
            candidate.token.trim().to_string()
        } else {
            std::mem::take(&mut candidate.token)
        };

        Ok(Credential::new(token, origin, expires_at, expiry_unknown))
    }
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MIN_TOKEN_LEN)
    }
}

/// Parse expiry metadata: RFC 3339 strings, or epoch seconds / milliseconds as
/// a number or numeric string.
pub fn parse_expiry(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            s.parse::<i64>().ok().and_then(from_epoch)
        }
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    if value > EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}
