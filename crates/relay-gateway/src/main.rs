use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use relay_core::RelayConfig;
use relay_stream::UpstreamClient;
use tracing::info;

mod app;
mod http;

/// Translates backend chat line streams into UI message SSE streams.
#[derive(Debug, Parser)]
#[command(name = "relay-gateway", version)]
struct Args {
    /// Path to relay.toml. Falls back to RELAY_CONFIG, then ~/.chat-relay/relay.toml.
    #[arg(long)]
    config: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_gateway=info,relay_stream=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config > RELAY_CONFIG env > ~/.chat-relay/relay.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("RELAY_CONFIG").ok());
    let mut config = RelayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        RelayConfig::default()
    });
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    let upstream = UpstreamClient::new(&config.upstream, &config.stream)?;
    info!(
        url = %upstream.url(),
        budget_ms = u64::try_from(upstream.budget().as_millis()).unwrap_or(u64::MAX),
        "upstream configured"
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, upstream));
    let router = app::build_router(state);

    info!("Relay gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
