//! SQL-backed token and client stores for OAuth2 authorization servers.
//!
//! [`SqlTokenStore`] and [`SqlClientStore`] implement the
//! [`oauthdb_types::TokenStore`] and [`oauthdb_types::ClientStore`] contracts
//! on top of any [`Backend`]. `SQLite`, `PostgreSQL` and `MySQL` adapters are
//! provided; [`connect`] picks one from configuration.

pub mod backend;
pub mod client;
pub mod gc;
pub mod row;
pub mod schema;
pub mod token;

pub use backend::{
    Backend, Dialect, MySqlBackend, Param, PostgresBackend, SqliteBackend, Statement, connect,
};
pub use client::SqlClientStore;
pub use gc::{DEFAULT_GC_INTERVAL, DiagnosticSink};
pub use row::{ClientRow, TokenRow};
pub use token::{SqlTokenStore, TokenStoreOptions};

/// Current unix time in seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
