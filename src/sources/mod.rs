//! Credential source adapters
//!
//! Each adapter owns its I/O and reports through [`Attempt`](crate::credential::Attempt).
//! The JSON layout shared by the keychain and credential files is parsed here.

use serde_json::Value;

use crate::credential::{Candidate, FailureKind, FailureReason, SourceKind};

pub mod active_session;
pub mod environment;
pub mod file_store;
pub mod native_store;

pub use active_session::ActiveSessionSource;
pub use environment::EnvironmentSource;
pub use file_store::FileStoreSource;
pub use native_store::NativeStoreSource;

/// Nested object the Claude CLI writes its OAuth state under.
const NESTED_OAUTH_KEY: &str = "claudeAiOauth";

/// Token fields in preference order.
const TOKEN_FIELDS: &[&str] = &["oauth_token", "accessToken", "access_token", "session_token"];
const EXPIRY_FIELDS: &[&str] = &["expires_at", "expiresAt"];

/// Parse a stored credential document into a candidate.
///
/// Accepts a flat object (`oauth_token` / `session_token` / `expires_at`) or
/// the nested `claudeAiOauth` layout. Blank token fields are skipped so a
/// populated `session_token` still wins over an empty `oauth_token`.
pub fn parse_stored_secret(raw: &str, origin: SourceKind) -> Result<Candidate, FailureReason> {
    let document: Value = serde_json::from_str(raw).map_err(|e| {
        FailureReason::new(
            FailureKind::ParseFailure,
            origin,
            format!("not valid JSON (line {}, column {})", e.line(), e.column()),
        )
    })?;

    if !document.is_object() {
        return Err(FailureReason::new(
            FailureKind::ParseFailure,
            origin,
            "expected a JSON object",
        ));
    }

    let scopes = [document.get(NESTED_OAUTH_KEY), Some(&document)];
    for scope in scopes.into_iter().flatten() {
        if let Some(token) = first_token(scope) {
            let expiry = EXPIRY_FIELDS
                .iter()
                .find_map(|field| scope.get(*field))
                .cloned()
                .unwrap_or(Value::Null);
            return Ok(Candidate::new(token, origin).with_expiry(expiry));
        }
    }

    Err(FailureReason::new(
        FailureKind::ParseFailure,
        origin,
        "no oauth_token or session_token field",
    ))
}

fn first_token(scope: &Value) -> Option<&str> {
    TOKEN_FIELDS.iter().find_map(|field| {
        scope
            .get(*field)
            .and_then(Value::as_str)
            .filter(|token| !token.trim().is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_oauth_over_session() {
        let candidate = parse_stored_secret(
            r#"{"oauth_token":"tok_a","session_token":"tok_b"}"#,
            SourceKind::FileStore,
        )
        .unwrap();
        assert_eq!(candidate.token, "tok_a");
    }

    #[test]
    fn test_blank_oauth_falls_back_to_session() {
        let candidate = parse_stored_secret(
            r#"{"oauth_token":"  ","session_token":"tok_b"}"#,
            SourceKind::FileStore,
        )
        .unwrap();
        assert_eq!(candidate.token, "tok_b");
    }

    #[test]
    fn test_nested_layout_with_expiry() {
        let candidate = parse_stored_secret(
            r#"{"claudeAiOauth":{"accessToken":"sk-ant-oat01-x","refreshToken":"r","expiresAt":1999999999000}}"#,
            SourceKind::NativeStore,
        )
        .unwrap();
        assert_eq!(candidate.token, "sk-ant-oat01-x");
        assert_eq!(candidate.expires_at, Some(serde_json::json!(1999999999000i64)));
    }

    #[test]
    fn test_flat_expiry_carried() {
        let candidate = parse_stored_secret(
            r#"{"oauth_token":"tok_a","expires_at":"2030-01-01T00:00:00Z"}"#,
            SourceKind::FileStore,
        )
        .unwrap();
        assert_eq!(candidate.expires_at, Some(serde_json::json!("2030-01-01T00:00:00Z")));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_stored_secret("oauth_token=abc", SourceKind::FileStore).unwrap_err();
        assert_eq!(err.kind, FailureKind::ParseFailure);
        assert!(!err.message.contains("abc"));
    }

    #[test]
    fn test_no_token_field() {
        let err = parse_stored_secret(r#"{"user":"me"}"#, SourceKind::FileStore).unwrap_err();
        assert_eq!(err.kind, FailureKind::ParseFailure);
    }

    #[test]
    fn test_non_object() {
        let err = parse_stored_secret(r#"["tok_a"]"#, SourceKind::FileStore).unwrap_err();
        assert_eq!(err.kind, FailureKind::ParseFailure);
    }
}
