//! Query relay - Entry Point
//!
//! Opens the message store, starts the TCP listener and accepts connections.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use query_relay::{serve, Config, MemoryStore, MessageStore, Relay, SqliteStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=query_relay=trace
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("query_relay=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let store: Arc<dyn MessageStore> = if config.uses_memory_store() {
        info!("Using in-memory message store; messages are not durable");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(&config.database_url).await?)
    };

    let listener = TcpListener::bind(&config.bind).await?;
    info!("Query relay listening on ws://{}", listener.local_addr()?);

    let relay = Arc::new(Relay::new(store, config.relay_settings()));
    serve(listener, relay).await;

    Ok(())
}
