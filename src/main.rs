//! recall-bridge - mobile backend for the recall learning platform

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recall_bridge::{
    config::Args,
    db::{MongoClient, MongoProgressStore},
    progress::{InMemoryProgressStore, ProgressStore},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("recall_bridge={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  recall-bridge");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Remote API: {}", args.remote_base_url());
    info!(
        "Remote timeouts: read {}ms, write {}ms",
        args.read_timeout_ms, args.write_timeout_ms
    );
    info!("MongoDB: {} (db '{}')", args.mongodb_uri, args.mongodb_db);
    info!("======================================");

    let store = connect_store(&args).await?;

    let state = Arc::new(AppState::new(args, store));
    server::run(state).await?;

    Ok(())
}

/// MongoDB-backed store, or the in-memory store when MongoDB is
/// unreachable in dev mode
async fn connect_store(args: &Args) -> anyhow::Result<Arc<dyn ProgressStore>> {
    let connected = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => MongoProgressStore::new(&client).await,
        Err(e) => Err(e),
    };

    match connected {
        Ok(store) => {
            info!("MongoDB connected successfully");
            Ok(Arc::new(store))
        }
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
            Ok(Arc::new(InMemoryProgressStore::new()))
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    }
}
