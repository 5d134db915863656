//! # Application State
//!
//! Configuration read from the environment and the shared state handed to
//! every handler.

use std::path::PathBuf;
use std::sync::Arc;

use broski_engagement::{
    ChallengeCatalog, Clock, EngagementService, InMemoryUserStore, SystemClock, UserStore,
};
use metrics_exporter_prometheus::PrometheusHandle;

/// Log output format for the server binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Application configuration.
///
/// Custom `Debug` redacts the database URL, which usually carries a password.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Postgres connection string. `None` runs the in-memory store.
    pub database_url: Option<String>,
    /// YAML challenge catalog. `None` uses the built-in table.
    pub catalog_path: Option<PathBuf>,
    /// Whether `/metrics` and the request counters are enabled.
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("catalog_path", &self.catalog_path)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            database_url: None,
            catalog_path: None,
            metrics_enabled: true,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PORT` (default: 4000)
    /// - `DATABASE_URL` (optional)
    /// - `BROSKI_CHALLENGE_CATALOG` (optional path to a YAML catalog)
    /// - `BROSKI_METRICS_ENABLED` (default: true; only `false` disables)
    /// - `BROSKI_LOG_FORMAT` (`json` for JSON lines)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            catalog_path: lookup("BROSKI_CHALLENGE_CATALOG")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            metrics_enabled: lookup("BROSKI_METRICS_ENABLED")
                .map(|v| v.trim().to_lowercase() != "false")
                .unwrap_or(true),
            log_format: match lookup("BROSKI_LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engagement: EngagementService,
    /// Renders the Prometheus scrape. `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("engagement", &self.engagement)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// In-memory state with the built-in catalog and the system clock.
    pub fn new() -> Self {
        Self::with_store(
            AppConfig::default(),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(SystemClock),
            Arc::new(ChallengeCatalog::builtin()),
        )
    }

    /// State over an explicit store, clock and catalog.
    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
        catalog: Arc<ChallengeCatalog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            engagement: EngagementService::new(store, clock, catalog),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
