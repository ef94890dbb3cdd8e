use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Yaml},
};
use oauthdb_types::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, time::Duration};

/// Prefix for environment overrides, e.g. `OAUTHDB_DATABASE__URL`.
pub const ENV_PREFIX: &str = "OAUTHDB_";

const DEFAULT_GC_INTERVAL_SECS: u64 = 600;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Sqlite,
    #[serde(alias = "postgresql")]
    Postgres,
    #[serde(alias = "mariadb")]
    Mysql,
}

impl Engine {
    /// Infers the engine from a connection URL scheme.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?;
        match scheme {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            _ => None,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        })
    }
}

fn default_max_idle() -> u32 {
    10
}
fn default_max_open() -> u32 {
    100
}
fn default_max_lifetime_secs() -> u64 {
    3600
}

/// Connection pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Connections kept open while idle (defaults to 10).
    #[serde(default = "default_max_idle")]
    pub max_idle: u32,
    /// Upper bound on open connections (defaults to 100).
    #[serde(default = "default_max_open")]
    pub max_open: u32,
    /// Maximum lifetime of a single connection in seconds (defaults to one hour).
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: default_max_idle(),
            max_open: default_max_open(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Rejects a pool that could never hand out a connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `max_open` is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_open == 0 {
            return Err(Error::Config("pool.max_open must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_url() -> String {
    "sqlite::memory:".to_string()
}

/// Backing database descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Engine kind. Inferred from the URL scheme when omitted.
    #[serde(default)]
    pub engine: Option<Engine>,
    /// Connection URL (defaults to an in-memory `SQLite` database).
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: None,
            url: default_url(),
            pool: PoolConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Creates a descriptor for the given URL with default pool sizing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Resolves the engine, checking it against the URL scheme.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the engine cannot be inferred from the URL,
    /// or if an explicit engine disagrees with the URL scheme.
    pub fn resolve_engine(&self) -> Result<Engine, Error> {
        let inferred = Engine::from_url(&self.url);
        match (self.engine, inferred) {
            (Some(explicit), Some(from_url)) if explicit != from_url => Err(Error::Config(
                format!("engine {explicit} does not match connection url scheme {from_url}"),
            )),
            (Some(engine), _) | (None, Some(engine)) => Ok(engine),
            (None, None) => Err(Error::Config(format!(
                "cannot infer database engine from url '{}'",
                redact(&self.url)
            ))),
        }
    }
}

/// Strips credentials from a connection URL before it is logged.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Logging output settings for the `oauthdb` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset (defaults to `info`).
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_token_table() -> String {
    "oauth2_token".to_string()
}
fn default_client_table() -> String {
    "oauth2_clients".to_string()
}
fn default_gc_interval_secs() -> u64 {
    DEFAULT_GC_INTERVAL_SECS
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token table name (defaults to `oauth2_token`).
    #[serde(default = "default_token_table")]
    pub token_table: String,
    /// Client table name (defaults to `oauth2_clients`).
    #[serde(default = "default_client_table")]
    pub client_table: String,
    /// Garbage collection interval in seconds; `0` selects the default of 600.
    #[serde(default = "default_gc_interval_secs")]
    pub gc_interval_secs: u64,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            token_table: default_token_table(),
            client_table: default_client_table(),
            gc_interval_secs: default_gc_interval_secs(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from a file path, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: &Path) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
    }

    /// Loads defaults, then the optional YAML file, then `OAUTHDB_*`
    /// environment overrides (nested keys separated by `__`).
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if any layer cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Effective garbage collection interval.
    #[must_use]
    pub fn gc_interval(&self) -> Duration {
        match self.gc_interval_secs {
            0 => Duration::from_secs(DEFAULT_GC_INTERVAL_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Checks settings that cannot be expressed in the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unresolvable engine or an empty pool.
    pub fn validate(&self) -> Result<(), Error> {
        self.database.resolve_engine()?;
        self.database.pool.validate()
    }
}
