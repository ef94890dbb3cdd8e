//! Persisted row shapes and their mapping from the payload models.

use oauthdb_types::{Client, Result, Token, TokenRowState};

/// One row of the token table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TokenRow {
    /// Surrogate key; `0` until the row is inserted.
    pub id: i64,
    /// Unix seconds, `0` for a row that never expires.
    pub expired_at: i64,
    pub code: String,
    pub access: String,
    pub refresh: String,
    /// JSON-encoded [`Token`].
    pub data: String,
}

impl TokenRow {
    /// Derives the key columns and expiry of a new row from `token`.
    ///
    /// A code token is keyed by its code alone. Otherwise the row is keyed by
    /// the access token and, if present, the refresh token; its expiry is the
    /// later of the two, and a refresh token without a lifetime makes the
    /// whole row non-expiring.
    ///
    /// # Errors
    ///
    /// Returns [`oauthdb_types::Error::Serialization`] if the token cannot be
    /// encoded.
    pub fn from_token(token: &Token) -> Result<Self> {
        let mut row = Self {
            id: 0,
            expired_at: 0,
            code: String::new(),
            access: String::new(),
            refresh: String::new(),
            data: serde_json::to_string(token)?,
        };

        if !token.code.is_empty() {
            row.code.clone_from(&token.code);
            row.expired_at = token.code_expires_at();
            return Ok(row);
        }

        row.access.clone_from(&token.access);
        if !token.access_expires_in.is_zero() {
            row.expired_at = token.access_expires_at();
        }

        if !token.refresh.is_empty() {
            row.refresh.clone_from(&token.refresh);
            if row.expired_at != 0 {
                if token.refresh_expires_in.is_zero() {
                    row.expired_at = 0;
                } else {
                    row.expired_at = row.expired_at.max(token.refresh_expires_at());
                }
            }
        }

        Ok(row)
    }

    /// Lifecycle state of this row at unix time `now`.
    #[must_use]
    pub fn state(&self, now: i64) -> TokenRowState {
        TokenRowState::derive(self.expired_at, &self.code, &self.access, &self.refresh, now)
    }

    /// Decodes the payload, or `None` if it is not a valid token.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match serde_json::from_str(&self.data) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(row_id = self.id, error = %e, "undecodable token payload, treating as not found");
                None
            }
        }
    }
}

/// One row of the client table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ClientRow {
    pub id: String,
    pub secret: String,
    pub domain: String,
    /// JSON-encoded [`Client`].
    pub data: String,
}

impl ClientRow {
    /// # Errors
    ///
    /// Returns [`oauthdb_types::Error::Serialization`] if the client cannot be
    /// encoded.
    pub fn from_client(client: &Client) -> Result<Self> {
        Ok(Self {
            id: client.id.clone(),
            secret: client.secret.clone(),
            domain: client.domain.clone(),
            data: serde_json::to_string(client)?,
        })
    }

    /// Decodes the payload, or `None` if it is not a valid client.
    #[must_use]
    pub fn client(&self) -> Option<Client> {
        match serde_json::from_str(&self.data) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(client_id = %self.id, error = %e, "undecodable client payload, treating as not found");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    const T0: i64 = 1_700_000_000;

    fn access_token(access_secs: u64) -> Token {
        Token {
            user_id: "1_1".into(),
            access: "a".into(),
            access_create_at: Utc.timestamp_opt(T0, 0).unwrap(),
            access_expires_in: Duration::from_secs(access_secs),
            ..Token::default()
        }
    }

    fn with_refresh(mut t: Token, refresh_secs: u64) -> Token {
        t.refresh = "r".into();
        t.refresh_create_at = Utc.timestamp_opt(T0, 0).unwrap();
        t.refresh_expires_in = Duration::from_secs(refresh_secs);
        t
    }

    #[test]
    fn test_code_row() {
        let t = Token {
            code: "11_11_11".into(),
            code_create_at: Utc.timestamp_opt(T0, 0).unwrap(),
            code_expires_in: Duration::from_secs(5),
            access: "ignored".into(),
            ..Token::default()
        };
        let row = TokenRow::from_token(&t).unwrap();
        assert_eq!(row.code, "11_11_11");
        assert!(row.access.is_empty());
        assert!(row.refresh.is_empty());
        assert_eq!(row.expired_at, T0 + 5);
        assert_eq!(row.state(T0), TokenRowState::ActiveByCode);
    }

    #[test]
    fn test_access_row() {
        let row = TokenRow::from_token(&access_token(5)).unwrap();
        assert_eq!(row.access, "a");
        assert_eq!(row.expired_at, T0 + 5);
        assert_eq!(row.state(T0), TokenRowState::ActiveByAccess);
        assert_eq!(row.state(T0 + 5), TokenRowState::Expired);
    }

    #[test]
    fn test_access_without_lifetime_never_expires() {
        let row = TokenRow::from_token(&access_token(0)).unwrap();
        assert_eq!(row.expired_at, 0);
    }

    #[test]
    fn test_refresh_extends_expiry() {
        let row = TokenRow::from_token(&with_refresh(access_token(5), 15)).unwrap();
        assert_eq!(row.refresh, "r");
        assert_eq!(row.expired_at, T0 + 15);
        assert_eq!(row.state(T0), TokenRowState::ActiveByAccessAndRefresh);
    }

    #[test]
    fn test_shorter_refresh_keeps_access_expiry() {
        let row = TokenRow::from_token(&with_refresh(access_token(60), 15)).unwrap();
        assert_eq!(row.expired_at, T0 + 60);
    }

    #[test]
    fn test_refresh_without_lifetime_never_expires() {
        let row = TokenRow::from_token(&with_refresh(access_token(5), 0)).unwrap();
        assert_eq!(row.expired_at, 0);
    }

    #[test]
    fn test_non_expiring_access_ignores_refresh_lifetime() {
        let row = TokenRow::from_token(&with_refresh(access_token(0), 15)).unwrap();
        assert_eq!(row.expired_at, 0);
    }

    #[test]
    fn test_payload_roundtrip() {
        let t = with_refresh(access_token(5), 15);
        let row = TokenRow::from_token(&t).unwrap();
        assert_eq!(row.token().unwrap(), t);
    }

    #[test]
    fn test_undecodable_payload_is_none() {
        let mut row = TokenRow::from_token(&access_token(5)).unwrap();
        row.data = "not json".into();
        assert!(row.token().is_none());

        let mut client = ClientRow::from_client(&Client::new("1", "s", "d")).unwrap();
        client.data = "{".into();
        assert!(client.client().is_none());
    }

    #[test]
    fn test_client_row() {
        let c = Client::new("1", "s", "http://localhost/").with_user("1_1");
        let row = ClientRow::from_client(&c).unwrap();
        assert_eq!(row.id, "1");
        assert_eq!(row.secret, "s");
        assert_eq!(row.domain, "http://localhost/");
        assert_eq!(row.client().unwrap().user_id, "1_1");
    }
}
