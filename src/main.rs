//! lvat server
//!
//! Receives logplex drains, indexes lines by configured fields and serves
//! the history of a value back over HTTP.

use anyhow::Context;
use clap::Parser;
use lvat::api::{serve, ApiConfig, AppState};
use lvat::config::{generate_default_config, Config, LoggingConfig};
use lvat::ingest::{IndexWriters, WorkerPool};
use lvat::query::Retriever;
use lvat::storage::{OptimisticStore, RedisStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lvat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Index log lines by field value and serve their history")]
struct Cli {
    /// Config file (default: search the usual locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a commented default config and exit
    #[arg(long)]
    print_default_config: bool,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lvat={},tower_http=info", logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = Config::load_default(cli.config.as_deref())?;
    init_tracing(&config.logging);
    config.validate()?;

    tracing::info!("Starting lvat v{}", env!("CARGO_PKG_VERSION"));

    let indices = Arc::new(config.index_set()?);
    for conf in indices.iter() {
        tracing::info!(
            index = %conf.key,
            max_size = conf.max_size,
            ttl_secs = conf.ttl.as_secs(),
            split_values = conf.split_values,
            storage = ?conf.storage,
            "Index configured"
        );
    }

    let store: Arc<dyn OptimisticStore> = Arc::new(
        RedisStore::connect(&config.store.redis_url, config.ingest.workers)
            .await
            .context("Failed to connect to Redis")?,
    );

    let writers = IndexWriters::new(
        Arc::clone(&store),
        config.retry_policy(),
        config.recent_ttl(),
    );
    let pool = WorkerPool::start(Arc::clone(&indices), writers, &config.pool_config());
    let retriever = Retriever::new(indices, Arc::clone(&store));

    let api_config = ApiConfig::new(
        &config.api.host,
        config.api.port,
        config.api.api_key.clone().unwrap_or_default(),
    );
    let state = AppState::new(pool.handle(), retriever, store, api_config.clone());

    let served = serve(state, &api_config).await;

    // Drain queued batches before exiting
    tracing::info!("Draining ingest queue...");
    pool.shutdown().await;

    served?;
    tracing::info!("lvat stopped");
    Ok(())
}
