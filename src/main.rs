//! Arena Duel - relay server and headless peer
//!
//! Usage: `arena-duel relay` or `arena-duel peer`

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_duel::config::{Config, LogFormat};
use arena_duel::game::autopilot::Autopilot;
use arena_duel::game::MatchCoordinator;
use arena_duel::net::peer::Peer;
use arena_duel::net::relay::RelayServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level, config.log_format);

    let role = std::env::args().nth(1).unwrap_or_else(|| "peer".to_string());
    match role.as_str() {
        "relay" => run_relay(config).await,
        "peer" => run_peer(config).await,
        other => anyhow::bail!("Unknown role {other:?}, expected relay or peer"),
    }
}

async fn run_relay(config: Config) -> anyhow::Result<()> {
    let server = RelayServer::bind(config.bind_addr, config.max_connections).await?;
    info!(
        addr = %server.local_addr()?,
        max_connections = config.max_connections,
        "Starting relay"
    );

    tokio::select! {
        result = server.run() => result?,
        _ = shutdown_signal() => {}
    }

    info!("Relay shutdown complete");
    Ok(())
}

async fn run_peer(config: Config) -> anyhow::Result<()> {
    let game = Arc::new(config.load_game_config()?);
    let seed = config.rng_seed.unwrap_or_else(rand::random);
    info!(
        relay = %config.relay_addr,
        game_id = config.game_id,
        seed,
        layout = ?game.map_layout,
        "Starting peer"
    );

    let fps = game.rules.fps;
    let coordinator = MatchCoordinator::new(game, config.game_id, seed);
    let peer = Peer::new(coordinator, Autopilot::new(seed.wrapping_add(1)), fps);

    tokio::select! {
        result = peer.run(&config.relay_addr) => result?,
        _ = shutdown_signal() => {}
    }

    info!("Peer shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
