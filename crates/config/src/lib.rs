//! Configuration loading for the oauthdb stores.
//!
//! Uses figment to layer built-in defaults, an optional YAML file and
//! `OAUTHDB_`-prefixed environment variables.

pub mod schema;

pub use schema::{Config, DatabaseConfig, Engine, LogConfig, PoolConfig};
