use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use weather_chat::config::Config;
use weather_chat::history::HistoryStore;
use weather_chat::kv::store_from_config;
use weather_chat::server::router;
use weather_chat::service::ChatService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    let kv = store_from_config(&config).await;
    let history = Arc::new(HistoryStore::new(
        kv,
        config.history.key.clone(),
        config.history_op_timeout(),
    ));
    let service = ChatService::from_config(&config, history);

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {e}", config.server.bind))?;

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "Starting weather chat server");

    axum::serve(listener, router(service)).await?;
    Ok(())
}
