//! Administration endpoints, guarded by a bearer token.

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::{ApiError, AppState, with_registry};
use crate::sync::SyncReport;
use crate::types::{Page, PagePath};

/// Body of the toggle endpoint.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub path: PagePath,
    pub is_visible: bool,
}

/// Routes mounted under `/admin`.
pub fn router(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/pages", get(list_all_handler))
        .route("/pages/toggle/{*path}", post(toggle_handler))
        .route("/sync", get(sync_status_handler))
        .route_layer(middleware::from_fn_with_state(app_state, require_admin))
}

async fn require_admin(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = app_state.admin_token() else {
        return Err(ApiError::Unauthorized);
    };
    let authorized = bearer_token(request.headers()).is_some_and(|t| tokens_match(t, expected));
    if !authorized {
        warn!(uri = %request.uri(), "Rejected admin request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Compares digests so neither contents nor length leak through timing.
fn tokens_match(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Lists every registered page, hidden ones included.
async fn list_all_handler(State(app_state): State<AppState>) -> Result<Json<Vec<Page>>, ApiError> {
    let pages = with_registry(&app_state, |registry| registry.list_all()).await?;
    Ok(Json(pages))
}

/// Flips a page's visibility. The path gets `.md` appended when missing.
async fn toggle_handler(
    State(app_state): State<AppState>,
    Path(raw_path): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let path = PagePath::from_request_path(&raw_path)?;
    let target = path.clone();
    let is_visible =
        with_registry(&app_state, move |registry| registry.toggle_visibility(&target)).await?;
    info!(path = %path, is_visible, "Toggled page visibility");
    Ok(Json(ToggleResponse { path, is_visible }))
}

/// Returns the most recent sync report.
async fn sync_status_handler(
    State(app_state): State<AppState>,
) -> Result<Json<SyncReport>, ApiError> {
    app_state
        .sync()
        .latest_report()
        .map(Json)
        .ok_or(ApiError::NotFound)
}
