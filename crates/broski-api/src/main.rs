//! # broski-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the Broski engagement API.
//! Binds to a configurable port (default 4000).

use std::sync::Arc;

use broski_api::db::users::PgUserStore;
use broski_api::middleware::metrics::{install_recorder, UPKEEP_INTERVAL};
use broski_api::state::{AppConfig, AppState, LogFormat};
use broski_engagement::{ChallengeCatalog, InMemoryUserStore, SystemClock, UserStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(?config, "starting broski-api");

    let catalog = match &config.catalog_path {
        Some(path) => ChallengeCatalog::load(path).map_err(|e| {
            tracing::error!("Challenge catalog failed to load: {e}");
            e
        })?,
        None => ChallengeCatalog::builtin(),
    };
    tracing::info!(
        version = catalog.version(),
        size = catalog.len(),
        "challenge catalog loaded"
    );

    // Database pool is optional; absent means in-memory only.
    let db_pool = broski_api::db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let store: Arc<dyn UserStore> = match db_pool {
        Some(pool) => Arc::new(PgUserStore::new(pool)),
        None => Arc::new(InMemoryUserStore::new()),
    };

    let metrics_on = config.metrics_enabled;
    let port = config.port;
    let mut state = AppState::with_store(
        config,
        store,
        Arc::new(SystemClock),
        Arc::new(catalog),
    );

    if metrics_on {
        let handle = install_recorder()?;
        let upkeep = handle.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);
            loop {
                ticker.tick().await;
                upkeep.run_upkeep();
            }
        });
        state = state.with_metrics(handle);
    }

    let app = broski_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Broski API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
