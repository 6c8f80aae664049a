mod config;
mod db;
mod event;
mod frame;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::store::{DocumentStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    // Postgres when configured, otherwise an in-process store.
    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => match db::init_pool(url, config.db_max_connections).await {
            Ok(pool) => Arc::new(PgStore::new(pool)),
            Err(e) => {
                tracing::error!(error = %e, "database init failed");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set; documents are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let verifier = match services::auth::verifier_from_config(&config.auth) {
        Ok(Some(verifier)) => Some(verifier),
        Ok(None) => {
            tracing::warn!("no token verifier configured; authenticated endpoints will answer 503");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "token verifier init failed");
            std::process::exit(1);
        }
    };

    let state = state::AppState::new(store, verifier).with_channel_capacity(config.client_channel_capacity);
    let app = routes::app(state, config.frontend_url.as_deref());

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(port = config.port, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(port = config.port, "synergy hub listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
    }
}
