//! Liveness probe.

use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is up"))
)]
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
