//! Liveness endpoint.

use axum::http::StatusCode;

/// Returns 200 with the body `OK` while the server accepts connections.
///
/// Does not consult the registry or the working copy; a failing sync does
/// not make the process unhealthy.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
