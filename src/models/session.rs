//! Access-token session records.

use serde::{Deserialize, Serialize};

/// Seconds shaved off the provider-declared lifetime so a token is never
/// used right at its deadline.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token grant returned by the authorization server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,

    /// Lifetime in seconds, as declared by the provider.
    pub expires_in: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Persisted form of an active session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,

    /// Epoch milliseconds after which the token must not be used.
    pub expiry: i64,
}

impl StoredSession {
    pub fn from_grant(grant: &TokenResponse, now_ms: i64) -> Self {
        Self {
            token: grant.access_token.clone(),
            expiry: now_ms.saturating_add(
                grant
                    .expires_in
                    .saturating_sub(EXPIRY_MARGIN_SECS)
                    .saturating_mul(1000),
            ),
        }
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expiry
    }
}

/// Where the session lifecycle currently stands.
///
/// There is no stored `Expired` state: an expired session is signed out the
/// moment it is noticed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active(StoredSession),
    SignedOut,
}

impl SessionState {
    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Active(session) => Some(&session.token),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_applies_safety_margin() {
        let grant = TokenResponse {
            access_token: "tok".into(),
            expires_in: 120,
            token_type: None,
            scope: None,
        };
        let session = StoredSession::from_grant(&grant, 1_000_000);
        assert_eq!(session.expiry, 1_060_000);
        assert!(session.is_valid_at(1_059_999));
        assert!(!session.is_valid_at(1_060_000));
    }

    #[test]
    fn extreme_lifetimes_saturate() {
        let grant = |expires_in| TokenResponse {
            access_token: "tok".into(),
            expires_in,
            token_type: None,
            scope: None,
        };
        let forever = StoredSession::from_grant(&grant(i64::MAX), 1_000);
        assert_eq!(forever.expiry, i64::MAX);
        assert!(forever.is_valid_at(1_000));

        let never = StoredSession::from_grant(&grant(i64::MIN), 1_000);
        assert!(!never.is_valid_at(1_000));
    }

    #[test]
    fn grant_decodes_provider_json() {
        let grant: TokenResponse = serde_json::from_str(
            r#"{"access_token":"ya29","expires_in":3599,"token_type":"Bearer","scope":"s"}"#,
        )
        .unwrap();
        assert_eq!(grant.access_token, "ya29");
        assert_eq!(grant.expires_in, 3599);
    }
}
