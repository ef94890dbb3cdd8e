//! Table layouts for the token and client tables.

use oauthdb_types::{Error, Result};

/// Default name of the token table.
pub const DEFAULT_TOKEN_TABLE: &str = "oauth2_token";
/// Default name of the client table.
pub const DEFAULT_CLIENT_TABLE: &str = "oauth2_clients";

/// Engine-independent column kinds; see [`crate::Dialect`] for the SQL types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Auto-increment surrogate primary key.
    AutoId,
    /// Externally assigned string primary key.
    StringKey,
    /// Unix seconds.
    Timestamp,
    /// Unix seconds, `NULL` when unset.
    NullableTimestamp,
    /// Bounded lookup key, `''` when unused.
    Key,
    /// Unbounded JSON payload.
    Payload,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

const TOKEN_COLUMNS: &[Column] = &[
    col("id", ColumnKind::AutoId),
    col("created_at", ColumnKind::Timestamp),
    col("updated_at", ColumnKind::Timestamp),
    col("deleted_at", ColumnKind::NullableTimestamp),
    col("expired_at", ColumnKind::Timestamp),
    col("code", ColumnKind::Key),
    col("access", ColumnKind::Key),
    col("refresh", ColumnKind::Key),
    col("data", ColumnKind::Payload),
];

const CLIENT_COLUMNS: &[Column] = &[
    col("id", ColumnKind::StringKey),
    col("created_at", ColumnKind::Timestamp),
    col("updated_at", ColumnKind::Timestamp),
    col("deleted_at", ColumnKind::NullableTimestamp),
    col("secret", ColumnKind::Key),
    col("domain", ColumnKind::Key),
    col("data", ColumnKind::Payload),
];

/// A named table and its columns.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub columns: &'static [Column],
}

/// Layout of the token table.
#[must_use]
pub fn token_table(name: &str) -> TableDef {
    TableDef {
        name: name.to_string(),
        columns: TOKEN_COLUMNS,
    }
}

/// Layout of the client table.
#[must_use]
pub fn client_table(name: &str) -> TableDef {
    TableDef {
        name: name.to_string(),
        columns: CLIENT_COLUMNS,
    }
}

/// Checks that `name` can be spliced into SQL as an unquoted identifier.
///
/// # Errors
///
/// Returns [`Error::Config`] unless `name` is 1–64 ASCII letters, digits or
/// underscores and does not start with a digit.
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid table name: {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_names() {
        assert!(validate_table_name(DEFAULT_TOKEN_TABLE).is_ok());
        assert!(validate_table_name(DEFAULT_CLIENT_TABLE).is_ok());
        assert!(validate_table_name("_tokens2").is_ok());
    }

    #[test]
    fn test_invalid_table_names() {
        for name in ["", "1tokens", "tokens; DROP TABLE x", "tok-ens", "schema.tokens"] {
            let err = validate_table_name(name).unwrap_err();
            assert!(err.is_config(), "{name}");
        }
        assert!(validate_table_name(&"t".repeat(65)).is_err());
    }

    #[test]
    fn test_token_table_layout() {
        let t = token_table("tokens");
        let names: Vec<_> = t.columns.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            [
                "id",
                "created_at",
                "updated_at",
                "deleted_at",
                "expired_at",
                "code",
                "access",
                "refresh",
                "data"
            ]
        );
    }
}
