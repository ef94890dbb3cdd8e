//! Database engine adapters.
//!
//! The stores talk to storage only through the [`Backend`] capability trait.
//! Each supported engine has one adapter, chosen once at construction time by
//! [`connect`]; SQL differences between engines live in [`Dialect`].

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlBackend;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

use crate::row::{ClientRow, TokenRow};
use crate::schema::{ColumnKind, TableDef};
use async_trait::async_trait;
use oauthdb_config::{DatabaseConfig, Engine};
use oauthdb_types::Result;
use std::borrow::Cow;
use std::sync::Arc;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Int(i64),
    Text(String),
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// SQL text with positional `?` placeholders and their parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends the value for the next `?` placeholder.
    #[must_use]
    pub fn bind(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// SQL flavour of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    /// Renders `?` placeholders in the engine's native syntax.
    #[must_use]
    pub fn placeholders<'a>(self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Self::Sqlite | Self::Mysql => Cow::Borrowed(sql),
            Self::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut n = 0;
                for ch in sql.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                Cow::Owned(out)
            }
        }
    }

    fn column_type(self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            (Self::Sqlite, ColumnKind::AutoId) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            (Self::Postgres, ColumnKind::AutoId) => "BIGSERIAL PRIMARY KEY",
            (Self::Mysql, ColumnKind::AutoId) => "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
            (_, ColumnKind::StringKey) => "VARCHAR(255) NOT NULL PRIMARY KEY",
            (_, ColumnKind::Timestamp) => "BIGINT NOT NULL DEFAULT 0",
            (_, ColumnKind::NullableTimestamp) => "BIGINT NULL",
            (_, ColumnKind::Key) => "VARCHAR(512) NOT NULL DEFAULT ''",
            (_, ColumnKind::Payload) => "TEXT NOT NULL",
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for `table`.
    #[must_use]
    pub fn create_table_sql(self, table: &TableDef) -> String {
        let columns = table
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, self.column_type(c.kind)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({columns})", table.name)
    }
}

impl From<Engine> for Dialect {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Sqlite => Self::Sqlite,
            Engine::Postgres => Self::Postgres,
            Engine::Mysql => Self::Mysql,
        }
    }
}

/// Storage capabilities required by the token and client stores.
#[async_trait]
pub trait Backend: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Executes a mutation and returns the number of affected rows.
    async fn execute(&self, stmt: Statement) -> Result<u64>;

    /// Executes a query whose first column of the single result row is a count.
    async fn count(&self, stmt: Statement) -> Result<i64>;

    /// Fetches the first token row produced by the query, if any.
    async fn fetch_token(&self, stmt: Statement) -> Result<Option<TokenRow>>;

    /// Fetches the first client row produced by the query, if any.
    async fn fetch_client(&self, stmt: Statement) -> Result<Option<ClientRow>>;

    /// Creates `table` unless it already exists.
    async fn create_table(&self, table: &TableDef) -> Result<()> {
        let sql = self.dialect().create_table_sql(table);
        self.execute(Statement::new(sql)).await?;
        Ok(())
    }
}

/// Opens a connection pool for the configured engine.
///
/// # Errors
///
/// Returns [`oauthdb_types::Error::Config`] if the engine cannot be resolved
/// or the pool allows no connections, and [`oauthdb_types::Error::Storage`]
/// if the connection fails.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match config.resolve_engine()? {
        Engine::Sqlite => Arc::new(SqliteBackend::connect(&config.url, &config.pool).await?),
        Engine::Postgres => Arc::new(PostgresBackend::connect(&config.url, &config.pool).await?),
        Engine::Mysql => Arc::new(MySqlBackend::connect(&config.url, &config.pool).await?),
    };
    Ok(backend)
}

/// Builds a sqlx query for `sql` with `params` bound in order.
fn bind_params<'q, DB>(
    sql: &'q str,
    params: &'q [Param],
) -> sqlx::query::Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>
where
    DB: sqlx::Database,
    i64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    &'q str: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
{
    let mut query = sqlx::query::<DB>(sql);
    for param in params {
        query = match param {
            Param::Int(v) => query.bind(*v),
            Param::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}
