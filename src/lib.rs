pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;
pub mod views;

use crate::api::handlers::{health, identify};
use crate::api::middleware::request_id::{REQUEST_ID_HEADER, request_id_middleware};
use crate::config::AppConfig;
use crate::services::analysis::PlantAnalyzer;
use crate::services::uploads::UploadStore;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Headroom for multipart boundaries and headers on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub uploads: Arc<UploadStore>,
    pub analyzer: Arc<dyn PlantAnalyzer>,
}

impl AppState {
    pub fn new(config: AppConfig, analyzer: Arc<dyn PlantAnalyzer>) -> Self {
        let uploads = Arc::new(UploadStore::new(
            config.uploads_dir(),
            config.max_upload_bytes,
        ));
        Self {
            config: Arc::new(config),
            uploads,
            analyzer,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);
    let public = ServeDir::new(&state.config.public_dir);

    Router::new()
        .route("/", get(identify::index))
        .route("/health", get(health::health_check))
        .route("/upload", post(identify::upload))
        .fallback_service(public)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
