//! In-memory session token

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde_json::Value;

/// Bearer token header sent on authenticated requests
pub const AUTH_TOKEN_HEADER: &str = "X-AIMS-Auth-Token";

/// MFA challenge token header
pub const SESSION_TOKEN_HEADER: &str = "X-AIMS-Session-Token";

/// Correlation id header
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// The token the transport attaches to requests.
///
/// It lives only in memory and is never refreshed; an expired token is
/// still sent and the server decides.
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<Token>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        *self.token.write() = Some(Token {
            value: token.into(),
            expires_at,
        });
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().as_ref().map(|t| t.value.clone())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.read().as_ref().and_then(|t| t.expires_at)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires| expires <= now)
    }

    /// Store the token carried by an authentication response.
    ///
    /// Returns false when the response has no token.
    pub fn store_from_response(&self, authentication: &Value) -> bool {
        let Some(token) = authentication.get("token").and_then(Value::as_str) else {
            return false;
        };
        let expires_at = authentication
            .get("token_expiration")
            .and_then(Value::as_i64)
            .and_then(|at| Utc.timestamp_opt(at, 0).single());
        self.set(token, expires_at);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_clear() {
        let session = Session::new();
        assert!(session.token().is_none());

        session.set("abc", None);
        assert_eq!(session.token().as_deref(), Some("abc"));
        assert!(!session.is_expired_at(Utc::now()));

        session.clear();
        assert!(session.token().is_none());
    }

    #[test]
    fn test_store_from_response() {
        let session = Session::new();
        let stored = session.store_from_response(&json!({
            "user": {"id": "U1"},
            "token": "abc",
            "token_expiration": 1_000
        }));
        assert!(stored);
        assert_eq!(session.token().as_deref(), Some("abc"));
        assert!(session.is_expired_at(Utc.timestamp_opt(1_000, 0).unwrap()));
        assert!(!session.is_expired_at(Utc.timestamp_opt(999, 0).unwrap()));
    }

    #[test]
    fn test_store_without_token() {
        let session = Session::new();
        assert!(!session.store_from_response(&json!({"user": {}})));
        assert!(session.token().is_none());
    }
}
