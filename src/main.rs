use anyhow::Result;
use clap::{Parser, Subcommand};
use oauthdb_config::{Config, LogConfig};
use oauthdb_store::{SqlClientStore, SqlTokenStore, TokenStoreOptions, connect};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "oauthdb", about = "SQL storage for OAuth2 tokens and clients", version)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Override the database connection URL.
    #[arg(long, value_name = "URL", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the token and client tables if they do not exist.
    Init,
    /// Delete expired and fully invalidated tokens once.
    Sweep,
    /// Run the garbage collector until interrupted.
    Gc {
        /// Override the collection interval in seconds.
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    config.validate()?;
    init_tracing(&config.log);

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Sweep => cmd_sweep(&config).await,
        Commands::Gc { interval } => {
            if let Some(secs) = interval {
                config.gc_interval_secs = secs;
            }
            cmd_gc(&config).await
        }
    }
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn cmd_init(config: &Config) -> Result<()> {
    let backend = connect(&config.database).await?;
    let tokens = SqlTokenStore::new(
        backend.clone(),
        TokenStoreOptions::from_config(config),
    )
    .await?;
    tokens.close();
    let clients = SqlClientStore::new(backend, &config.client_table).await?;
    println!(
        "tables ready: {}, {}",
        tokens.table_name(),
        clients.table_name()
    );
    Ok(())
}

async fn cmd_sweep(config: &Config) -> Result<()> {
    let store = SqlTokenStore::from_config(config).await?;
    store.close();
    let deleted = store.sweep().await?;
    println!("{deleted} token rows deleted from {}", store.table_name());
    Ok(())
}

async fn cmd_gc(config: &Config) -> Result<()> {
    let store = SqlTokenStore::from_config(config).await?;
    tracing::info!(
        table = store.table_name(),
        interval_secs = config.gc_interval().as_secs(),
        "garbage collector running, press Ctrl-C to stop"
    );
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            store.close();
            Ok(())
        }
        () = store.stopped() => {
            anyhow::bail!("garbage collector for {} stopped unexpectedly", store.table_name())
        }
    }
}
