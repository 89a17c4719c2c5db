mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use meridian_api::{AppState, AppStateInner};
use meridian_relay::{ChannelSigner, HostedRelay, Relay};

use crate::config::{Config, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian=debug,meridian_api=debug,meridian_relay=debug,meridian_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}.", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = meridian_db::Database::open(&config.db_path)?;

    let relay = match config.relay {
        RelayConfig::Local { key, secret } => {
            info!("Serving the relay socket at /relay");
            Relay::local(ChannelSigner::new(key, secret))
        }
        RelayConfig::Hosted(hosted) => {
            info!("Publishing relay events to app {} on {}", hosted.app_id, hosted.cluster);
            Relay::hosted(HostedRelay::new(hosted))
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        relay,
    });

    let app = meridian_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Meridian server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
