//! SQL-backed [`ClientStore`].
//!
//! Schema: `<table>(id, created_at, updated_at, deleted_at, secret, domain, data)`
//! keyed by the external client id.

use crate::{
    backend::{self, Backend, Statement},
    row::ClientRow,
    schema::{self, DEFAULT_CLIENT_TABLE},
    unix_now,
};
use async_trait::async_trait;
use oauthdb_config::Config;
use oauthdb_types::{Client, ClientStore, Error, Result};
use std::sync::Arc;

/// A persistent [`ClientStore`].
pub struct SqlClientStore {
    backend: Arc<dyn Backend>,
    table: String,
}

impl SqlClientStore {
    /// Creates the client table if absent. An empty `table` selects `oauth2_clients`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid table name and
    /// [`Error::Storage`] if the table cannot be created.
    pub async fn new(backend: Arc<dyn Backend>, table: &str) -> Result<Self> {
        let table = if table.is_empty() {
            DEFAULT_CLIENT_TABLE
        } else {
            table
        };
        schema::validate_table_name(table)?;
        backend.create_table(&schema::client_table(table)).await?;
        Ok(Self {
            backend,
            table: table.to_string(),
        })
    }

    /// Connects to the configured database and builds the store.
    ///
    /// # Errors
    ///
    /// See [`SqlClientStore::new`] and [`backend::connect`].
    pub async fn from_config(config: &Config) -> Result<Self> {
        let backend = backend::connect(&config.database).await?;
        Self::new(backend, &config.client_table).await
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl ClientStore for SqlClientStore {
    async fn create(&self, client: &Client) -> Result<()> {
        if client.id.is_empty() {
            return Err(Error::InvalidRecord("client id must not be empty".into()));
        }
        let row = ClientRow::from_client(client)?;
        let now = unix_now();
        let sql = format!(
            "INSERT INTO {} (id, created_at, updated_at, secret, domain, data) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.table
        );
        self.backend
            .execute(
                Statement::new(sql)
                    .bind(row.id)
                    .bind(now)
                    .bind(now)
                    .bind(row.secret)
                    .bind(row.domain)
                    .bind(row.data),
            )
            .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Client>> {
        if id.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT id, secret, domain, data FROM {} WHERE id = ? AND deleted_at IS NULL",
            self.table
        );
        let row = self.backend.fetch_client(Statement::new(sql).bind(id)).await?;
        Ok(row.as_ref().and_then(ClientRow::client))
    }
}
