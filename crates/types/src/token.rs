//! OAuth2 token model and the lifecycle state of a persisted token row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token information issued by the authorization server.
///
/// A token carries either an authorization code, or an access token with an
/// optional refresh token. A lifetime of [`Duration::ZERO`] means the
/// credential never expires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub code: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub code_create_at: DateTime<Utc>,
    pub code_expires_in: Duration,
    pub access: String,
    pub access_create_at: DateTime<Utc>,
    pub access_expires_in: Duration,
    pub refresh: String,
    pub refresh_create_at: DateTime<Utc>,
    pub refresh_expires_in: Duration,
}

impl Token {
    /// Create an authorization-code token issued now.
    pub fn authorization_code(
        client_id: impl Into<String>,
        user_id: impl Into<String>,
        code: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
            code: code.into(),
            code_create_at: Utc::now(),
            code_expires_in: expires_in,
            ..Self::default()
        }
    }

    /// Create an access token issued now.
    pub fn access_token(
        client_id: impl Into<String>,
        user_id: impl Into<String>,
        access: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: user_id.into(),
            access: access.into(),
            access_create_at: Utc::now(),
            access_expires_in: expires_in,
            ..Self::default()
        }
    }

    /// Attach a refresh token issued now.
    #[must_use]
    pub fn with_refresh(mut self, refresh: impl Into<String>, expires_in: Duration) -> Self {
        self.refresh = refresh.into();
        self.refresh_create_at = Utc::now();
        self.refresh_expires_in = expires_in;
        self
    }

    /// Set the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// Unix timestamp at which the authorization code expires.
    #[must_use]
    pub fn code_expires_at(&self) -> i64 {
        expires_at(self.code_create_at, self.code_expires_in)
    }

    /// Unix timestamp at which the access token expires.
    #[must_use]
    pub fn access_expires_at(&self) -> i64 {
        expires_at(self.access_create_at, self.access_expires_in)
    }

    /// Unix timestamp at which the refresh token expires.
    #[must_use]
    pub fn refresh_expires_at(&self) -> i64 {
        expires_at(self.refresh_create_at, self.refresh_expires_in)
    }
}

fn expires_at(created: DateTime<Utc>, lifetime: Duration) -> i64 {
    let lifetime_ms = i64::try_from(lifetime.as_millis()).unwrap_or(i64::MAX);
    created
        .timestamp_millis()
        .saturating_add(lifetime_ms)
        .div_euclid(1000)
}

/// Lifecycle state of a persisted token row.
///
/// Derived from which key columns are still populated and from the row's
/// expiry. Key columns are only ever cleared, so a row moves from one of the
/// `Active*` states towards [`TokenRowState::FullyInvalidated`] or
/// [`TokenRowState::Expired`]; the garbage collector is the only transition
/// out of those two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRowState {
    ActiveByCode,
    ActiveByAccess,
    ActiveByAccessAndRefresh,
    /// The access token was invalidated but the refresh token is still live.
    ActiveByRefresh,
    /// Every key column has been cleared.
    FullyInvalidated,
    /// `expired_at` is set and lies at or before the evaluation time.
    Expired,
}

impl TokenRowState {
    /// Derive the state of a row at unix time `now`.
    ///
    /// An `expired_at` of `0` means the row never expires.
    #[must_use]
    pub fn derive(expired_at: i64, code: &str, access: &str, refresh: &str, now: i64) -> Self {
        if expired_at != 0 && expired_at <= now {
            return Self::Expired;
        }
        match (code.is_empty(), access.is_empty(), refresh.is_empty()) {
            (false, _, _) => Self::ActiveByCode,
            (true, false, true) => Self::ActiveByAccess,
            (true, false, false) => Self::ActiveByAccessAndRefresh,
            (true, true, false) => Self::ActiveByRefresh,
            (true, true, true) => Self::FullyInvalidated,
        }
    }

    /// Whether the garbage collector deletes rows in this state.
    #[must_use]
    pub fn is_collectable(self) -> bool {
        matches!(self, Self::FullyInvalidated | Self::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_expires_at_adds_lifetime() {
        let t = Token {
            access_create_at: at(1_000),
            access_expires_in: Duration::from_secs(3600),
            ..Token::default()
        };
        assert_eq!(t.access_expires_at(), 4_600);
    }

    #[test]
    fn test_expires_at_floors_sub_second() {
        let created = Utc.timestamp_millis_opt(10_700).unwrap();
        let t = Token {
            code_create_at: created,
            code_expires_in: Duration::from_millis(500),
            ..Token::default()
        };
        assert_eq!(t.code_expires_at(), 11);
    }

    #[test]
    fn test_builders() {
        let t = Token::access_token("1", "1_1", "a", Duration::from_secs(5))
            .with_refresh("r", Duration::from_secs(15))
            .with_scope("all")
            .with_redirect_uri("http://localhost/");
        assert_eq!(t.access, "a");
        assert_eq!(t.refresh, "r");
        assert_eq!(t.scope, "all");
        assert_eq!(t.redirect_uri, "http://localhost/");
        assert!(t.code.is_empty());
    }

    #[test]
    fn test_serde_roundtrip() {
        let t = Token::authorization_code("1", "1_1", "11_11_11", Duration::from_secs(5));
        let json = serde_json::to_string(&t).unwrap();
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_deserialize_missing_fields_defaults() {
        let t: Token = serde_json::from_str(r#"{"user_id":"u"}"#).unwrap();
        assert_eq!(t.user_id, "u");
        assert_eq!(t.access_expires_in, Duration::ZERO);
    }

    #[test]
    fn test_state_from_keys() {
        let now = 100;
        assert_eq!(
            TokenRowState::derive(200, "c", "", "", now),
            TokenRowState::ActiveByCode
        );
        assert_eq!(
            TokenRowState::derive(200, "", "a", "", now),
            TokenRowState::ActiveByAccess
        );
        assert_eq!(
            TokenRowState::derive(0, "", "a", "r", now),
            TokenRowState::ActiveByAccessAndRefresh
        );
        assert_eq!(
            TokenRowState::derive(200, "", "", "r", now),
            TokenRowState::ActiveByRefresh
        );
        assert_eq!(
            TokenRowState::derive(0, "", "", "", now),
            TokenRowState::FullyInvalidated
        );
    }

    #[test]
    fn test_state_expired_takes_precedence() {
        assert_eq!(
            TokenRowState::derive(100, "", "a", "r", 100),
            TokenRowState::Expired
        );
        assert_eq!(
            TokenRowState::derive(99, "c", "", "", 100),
            TokenRowState::Expired
        );
    }

    #[test]
    fn test_zero_expiry_never_expires() {
        let state = TokenRowState::derive(0, "", "a", "", i64::MAX);
        assert_eq!(state, TokenRowState::ActiveByAccess);
        assert!(!state.is_collectable());
    }

    #[test]
    fn test_collectable_states() {
        assert!(TokenRowState::Expired.is_collectable());
        assert!(TokenRowState::FullyInvalidated.is_collectable());
        assert!(!TokenRowState::ActiveByCode.is_collectable());
        assert!(!TokenRowState::ActiveByRefresh.is_collectable());
    }
}
