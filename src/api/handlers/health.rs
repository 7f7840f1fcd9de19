use axum::{http::StatusCode, response::IntoResponse};

/// Liveness check. Does not touch the filesystem or the analysis service.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
