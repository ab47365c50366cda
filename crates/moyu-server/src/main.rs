mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use moyu_api::payment::{OfflineGateway, PaymentGateway, SnapGateway};
use moyu_api::storage::UploadStore;
use moyu_api::token::TokenService;
use moyu_api::{AppState, AppStateInner};

use crate::config::{Config, Environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moyu=debug,moyu_api=debug,moyu_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.environment == Environment::Development {
        warn!("Running in development mode");
    }

    // Init database
    let db = moyu_db::Database::open(&config.db_path)?;
    let uploads = UploadStore::new(config.upload_dir.clone()).await?;

    let payment: Arc<dyn PaymentGateway> = match &config.payment_server_key {
        Some(key) => {
            info!("Payment gateway: {}", config.payment_snap_url);
            Arc::new(SnapGateway::new(key.clone(), config.payment_snap_url.clone())?)
        }
        None => {
            warn!("MIDTRANS_SERVER_KEY not set; transactions get no payment URL");
            Arc::new(OfflineGateway)
        }
    };

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(&config.jwt_secret, config.token_ttl),
        payment,
        uploads,
        payment_server_key: config.payment_server_key.clone(),
    });

    let app = moyu_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("moyu listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());
        match sigterm {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
