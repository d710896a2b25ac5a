//! tabflow API server
//!
//! One process, one uploaded workbook, one session. Requests are handled
//! one at a time against the shared session.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::handlers;
use crate::core::Session;
use crate::excel::SheetSelector;
use crate::logging::init_tracing;
use crate::store::{FsUploadStore, UploadStore, DEFAULT_UPLOAD_PATH};

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// API Server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub upload_path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upload_path: PathBuf::from(DEFAULT_UPLOAD_PATH),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub version: String,
    pub session: Mutex<Session>,
    pub store: Arc<dyn UploadStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn UploadStore>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            session: Mutex::new(Session::new()),
            store,
        }
    }

    /// Load the first sheet of a file left over from a previous run
    pub fn restore(&self) {
        let bytes = match self.store.load() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "could not read stored upload");
                return;
            }
        };
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        match session.load(&bytes, &SheetSelector::default()) {
            Ok(table) => info!(rows = table.row_count(), "restored stored upload"),
            Err(e) => warn!(error = %e, "stored upload could not be loaded"),
        }
    }
}

/// All routes, with CORS and request tracing
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Pipeline endpoints
        .route(
            "/api/v1/upload",
            post(handlers::upload).delete(handlers::remove_upload),
        )
        .route("/api/v1/sheets", get(handlers::sheets))
        .route("/api/v1/load", post(handlers::load))
        .route("/api/v1/filters", get(handlers::filters))
        .route("/api/v1/filter", post(handlers::filter))
        .route("/api/v1/formula", post(handlers::formula))
        .route("/api/v1/table", get(handlers::table))
        .route("/api/v1/columns/numeric", get(handlers::numeric_columns))
        .route("/api/v1/plot", post(handlers::plot))
        // State and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    init_tracing("tabflow=info,tower_http=info");

    let store: Arc<dyn UploadStore> = Arc::new(FsUploadStore::new(&config.upload_path));
    let state = Arc::new(AppState::new(store));
    state.restore();

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("📊 tabflow API server starting on http://{}", addr);
    info!("   Upload file: {}", config.upload_path.display());
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tabflow API server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryUploadStore;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.upload_path, PathBuf::from("uploaded.xlsx"));
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "192.168.1.100".to_string(),
            port: 9090,
            ..ApiConfig::default()
        };
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().unwrap();
        assert_eq!(addr.port(), 9090);
    }

    #[test]
    fn test_restore_without_upload_leaves_session_empty() {
        let state = AppState::new(Arc::new(MemoryUploadStore::new()));
        state.restore();
        assert!(!state.session.lock().unwrap().is_loaded());
    }

    #[test]
    fn test_restore_ignores_unreadable_upload() {
        let store = Arc::new(MemoryUploadStore::new());
        store.save(b"not a workbook").unwrap();
        let state = AppState::new(store);
        state.restore();
        assert!(!state.session.lock().unwrap().is_loaded());
    }
}
