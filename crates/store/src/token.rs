//! SQL-backed [`TokenStore`].
//!
//! Schema: `<table>(id, created_at, updated_at, deleted_at, expired_at, code,
//! access, refresh, data)`, one row per issued code or access/refresh pair.
//! Removing a key only clears its column; rows are reclaimed by the garbage
//! collector once expired or once every key column is empty.

use crate::{
    backend::{self, Backend, Statement},
    gc::{Collector, DEFAULT_GC_INTERVAL, DiagnosticSink},
    row::TokenRow,
    schema::{self, DEFAULT_TOKEN_TABLE},
    unix_now,
};
use async_trait::async_trait;
use oauthdb_config::Config;
use oauthdb_types::{Result, Token, TokenStore};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lookup key columns of the token table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyColumn {
    Code,
    Access,
    Refresh,
}

impl KeyColumn {
    fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Construction options for [`SqlTokenStore`].
#[derive(Debug, Clone)]
pub struct TokenStoreOptions {
    /// Table name (defaults to `oauth2_token`).
    pub table: String,
    /// Interval between garbage collection sweeps; zero selects the default of 600 s.
    pub gc_interval: Duration,
    /// Destination for garbage collector errors.
    pub diagnostics: DiagnosticSink,
}

impl Default for TokenStoreOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TOKEN_TABLE.to_string(),
            gc_interval: DEFAULT_GC_INTERVAL,
            diagnostics: DiagnosticSink::default(),
        }
    }
}

impl TokenStoreOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            table: config.token_table.clone(),
            gc_interval: config.gc_interval(),
            ..Self::default()
        }
    }
}

/// A persistent [`TokenStore`] with a background garbage collector.
///
/// The collector task is started by the constructor and stopped by
/// [`SqlTokenStore::close`] or when the store is dropped.
pub struct SqlTokenStore {
    backend: Arc<dyn Backend>,
    table: String,
    collector: Collector,
    diagnostics: DiagnosticSink,
    cancel: CancellationToken,
    gc_done: CancellationToken,
    gc_task: JoinHandle<()>,
}

impl SqlTokenStore {
    /// Creates the token table if absent, then starts the garbage collector.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`oauthdb_types::Error::Config`] for an invalid table name and
    /// [`oauthdb_types::Error::Storage`] if the table cannot be created.
    pub async fn new(backend: Arc<dyn Backend>, options: TokenStoreOptions) -> Result<Self> {
        let TokenStoreOptions {
            table,
            gc_interval,
            diagnostics,
        } = options;
        let table = if table.is_empty() {
            DEFAULT_TOKEN_TABLE.to_string()
        } else {
            table
        };
        schema::validate_table_name(&table)?;
        backend.create_table(&schema::token_table(&table)).await?;

        let period = if gc_interval.is_zero() {
            DEFAULT_GC_INTERVAL
        } else {
            gc_interval
        };
        let cancel = CancellationToken::new();
        let gc_done = CancellationToken::new();
        let gc_task = Collector::new(Arc::clone(&backend), table.clone()).spawn(
            period,
            diagnostics.clone(),
            cancel.clone(),
            gc_done.clone(),
        );

        tracing::debug!(table = %table, gc_interval_secs = period.as_secs(), "token store ready");
        Ok(Self {
            collector: Collector::new(Arc::clone(&backend), table.clone()),
            backend,
            table,
            diagnostics,
            cancel,
            gc_done,
            gc_task,
        })
    }

    /// Connects to the configured database and builds the store.
    ///
    /// # Errors
    ///
    /// Returns [`oauthdb_types::Error::Config`] for an unsupported engine or
    /// invalid table name and [`oauthdb_types::Error::Storage`] if the
    /// database is unreachable.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let backend = backend::connect(&config.database).await?;
        Self::new(backend, TokenStoreOptions::from_config(config)).await
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Redirects garbage collector error output.
    pub fn set_diagnostics(&self, out: impl std::io::Write + Send + 'static) {
        self.diagnostics.replace(out);
    }

    /// Stops scheduling garbage collection. A sweep already running finishes.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether the garbage collector task is still alive.
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        !self.gc_task.is_finished()
    }

    /// Resolves once the garbage collector task has exited, either after
    /// [`SqlTokenStore::close`] or because a count query failed.
    pub async fn stopped(&self) {
        self.gc_done.cancelled().await;
    }

    /// Runs one garbage collection pass now and returns the number of deleted rows.
    ///
    /// # Errors
    ///
    /// Returns [`oauthdb_types::Error::Storage`] if the count or delete fails.
    pub async fn sweep(&self) -> Result<u64> {
        let deleted = self.collector.sweep(unix_now()).await?;
        if deleted > 0 {
            tracing::info!(table = %self.table, deleted, "manual gc sweep complete");
        }
        Ok(deleted)
    }

    async fn get_by(&self, column: KeyColumn, key: &str) -> Result<Option<Token>> {
        if key.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT id, expired_at, code, access, refresh, data FROM {} \
             WHERE {col} = ? AND deleted_at IS NULL ORDER BY id LIMIT 1",
            self.table,
            col = column.as_str(),
        );
        let row = self.backend.fetch_token(Statement::new(sql).bind(key)).await?;
        Ok(row.as_ref().and_then(TokenRow::token))
    }

    async fn remove_by(&self, column: KeyColumn, key: &str) -> Result<()> {
        if key.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "UPDATE {} SET {col} = '', updated_at = ? WHERE {col} = ? AND deleted_at IS NULL",
            self.table,
            col = column.as_str(),
        );
        self.backend
            .execute(Statement::new(sql).bind(unix_now()).bind(key))
            .await?;
        Ok(())
    }
}

impl Drop for SqlTokenStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl TokenStore for SqlTokenStore {
    async fn create(&self, token: &Token) -> Result<()> {
        let row = TokenRow::from_token(token)?;
        let now = unix_now();
        let sql = format!(
            "INSERT INTO {} (created_at, updated_at, expired_at, code, access, refresh, data) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table
        );
        self.backend
            .execute(
                Statement::new(sql)
                    .bind(now)
                    .bind(now)
                    .bind(row.expired_at)
                    .bind(row.code)
                    .bind(row.access)
                    .bind(row.refresh)
                    .bind(row.data),
            )
            .await?;
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Token>> {
        self.get_by(KeyColumn::Code, code).await
    }

    async fn get_by_access(&self, access: &str) -> Result<Option<Token>> {
        self.get_by(KeyColumn::Access, access).await
    }

    async fn get_by_refresh(&self, refresh: &str) -> Result<Option<Token>> {
        self.get_by(KeyColumn::Refresh, refresh).await
    }

    async fn remove_by_code(&self, code: &str) -> Result<()> {
        self.remove_by(KeyColumn::Code, code).await
    }

    async fn remove_by_access(&self, access: &str) -> Result<()> {
        self.remove_by(KeyColumn::Access, access).await
    }

    async fn remove_by_refresh(&self, refresh: &str) -> Result<()> {
        self.remove_by(KeyColumn::Refresh, refresh).await
    }
}
