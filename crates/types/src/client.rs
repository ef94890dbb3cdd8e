//! OAuth2 client model.

use serde::{Deserialize, Serialize};

/// A registered OAuth2 client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub id: String,
    pub secret: String,
    pub domain: String,
    /// Public clients authenticate without a secret.
    pub public: bool,
    pub user_id: String,
}

impl Client {
    /// Create a confidential client.
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// Set the owning user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_confidential() {
        let c = Client::new("1", "s", "http://localhost/").with_user("1_1");
        assert!(!c.public);
        assert_eq!(c.user_id, "1_1");
    }

    #[test]
    fn test_deserialize_partial() {
        let c: Client = serde_json::from_str(r#"{"id":"1","public":true}"#).unwrap();
        assert_eq!(c.id, "1");
        assert!(c.public);
        assert!(c.secret.is_empty());
    }
}
