//! Storage contracts consumed by the OAuth2 authorization server.
//!
//! Lookups return `Ok(None)` for "not found", including for an empty key.
//! Callers must also treat `None` as "possibly expired and collected since
//! the last check".

use crate::{Client, Error, Token};
use async_trait::async_trait;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Persistent storage for authorization codes, access tokens and refresh tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist newly issued token information.
    async fn create(&self, token: &Token) -> Result<()>;

    /// Look up token information by authorization code.
    async fn get_by_code(&self, code: &str) -> Result<Option<Token>>;
    /// Look up token information by access token.
    async fn get_by_access(&self, access: &str) -> Result<Option<Token>>;
    /// Look up token information by refresh token.
    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<Token>>;

    /// Invalidate an authorization code.
    async fn remove_by_code(&self, code: &str) -> Result<()>;
    /// Invalidate an access token; a refresh token on the same record stays valid.
    async fn remove_by_access(&self, access: &str) -> Result<()>;
    /// Invalidate a refresh token; an access token on the same record stays valid.
    async fn remove_by_refresh(&self, refresh: &str) -> Result<()>;
}

/// Persistent storage for registered OAuth2 clients.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Persist a new client.
    async fn create(&self, client: &Client) -> Result<()>;
    /// Look up a client by its id.
    async fn get_by_id(&self, id: &str) -> Result<Option<Client>>;
}
