//! `SQLite` adapter.

use super::{Backend, Dialect, Statement, bind_params};
use crate::row::{ClientRow, TokenRow};
use async_trait::async_trait;
use oauthdb_config::PoolConfig;
use oauthdb_types::Result;
use sqlx::{
    FromRow as _, Row as _, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

/// [`Backend`] over a `SQLite` connection pool.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Connects to a `SQLite` database (e.g. `"sqlite:./oauth.db"` or `"sqlite::memory:"`).
    ///
    /// Creates the database file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`oauthdb_types::Error::Config`] for a pool with `max_open` of
    /// zero and [`oauthdb_types::Error::Storage`] if the URL is malformed or
    /// the connection fails.
    pub async fn connect(url: &str, pool: &PoolConfig) -> Result<Self> {
        pool.validate()?;
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(pool.max_open)
            .min_connections(pool.max_idle.min(pool.max_open))
            .max_lifetime(pool.max_lifetime())
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, stmt: Statement) -> Result<u64> {
        let done = bind_params::<Sqlite>(&stmt.sql, &stmt.params)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn count(&self, stmt: Statement) -> Result<i64> {
        let row = bind_params::<Sqlite>(&stmt.sql, &stmt.params)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn fetch_token(&self, stmt: Statement) -> Result<Option<TokenRow>> {
        let row = bind_params::<Sqlite>(&stmt.sql, &stmt.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(TokenRow::from_row).transpose()?)
    }

    async fn fetch_client(&self, stmt: Statement) -> Result<Option<ClientRow>> {
        let row = bind_params::<Sqlite>(&stmt.sql, &stmt.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(ClientRow::from_row).transpose()?)
    }
}
