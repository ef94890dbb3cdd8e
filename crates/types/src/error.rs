//! Unified error type for the oauthdb workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across oauthdb crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unsupported configuration (engine, connection URL, table name).
    #[error("configuration error: {0}")]
    Config(String),

    /// Database failure: connectivity, constraint violation or query error.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON serialization of a token or client payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record was rejected before reaching storage.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl Error {
    /// Returns `true` for errors raised while building a store rather than
    /// while serving a request.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("unsupported engine: oracle".to_string());
        assert_eq!(err.to_string(), "configuration error: unsupported engine: oracle");
        assert!(err.is_config());
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("no such table: oauth2_token".to_string());
        assert!(err.to_string().starts_with("storage error:"));
        assert!(!err.is_config());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid {{{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
