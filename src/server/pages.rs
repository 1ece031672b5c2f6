//! Public page endpoints.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use tracing::{debug, warn};

use super::{ApiError, AppState, with_registry};
use crate::types::{HOME_PAGE, NavEntry, PagePath};

/// Body of `GET /api/pages/{*path}`.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub path: PagePath,
    pub title: String,
    /// Raw markdown source; rendering happens elsewhere.
    pub markdown: String,
}

/// Lists visible pages for navigation.
pub async fn list_pages_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<NavEntry>>, ApiError> {
    let entries = with_registry(&app_state, |registry| registry.list_visible()).await?;
    Ok(Json(entries))
}

/// Serves the home page for `GET /api/pages/`.
pub async fn home_page_handler(
    State(app_state): State<AppState>,
) -> Result<Json<PageResponse>, ApiError> {
    serve_page(&app_state, PagePath::new(HOME_PAGE)).await
}

/// Serves one visible page and records the visit.
///
/// A slash-only path names the home page. Hidden and unknown pages are both
/// 404. The visit counter is bumped in the background after the page has
/// been read; a failed increment only logs.
pub async fn page_handler(
    State(app_state): State<AppState>,
    Path(raw_path): Path<String>,
) -> Result<Json<PageResponse>, ApiError> {
    let path = PagePath::from_page_request(&raw_path)?;
    serve_page(&app_state, path).await
}

async fn serve_page(app_state: &AppState, path: PagePath) -> Result<Json<PageResponse>, ApiError> {
    let lookup = path.clone();
    let page = with_registry(app_state, move |registry| registry.get_by_path(&lookup)).await?;
    if !page.is_visible {
        debug!(path = %path, "Request for hidden page");
        return Err(ApiError::NotFound);
    }

    let file = app_state.content_root().join(path.as_str());
    let markdown = match tokio::fs::read_to_string(&file).await {
        Ok(markdown) => markdown,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path, "Registered page has no file in the working copy");
            return Err(ApiError::NotFound);
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };

    let registry = std::sync::Arc::clone(app_state.registry());
    let visited = path.clone();
    tokio::task::spawn_blocking(move || registry.increment_visit(&visited));

    Ok(Json(PageResponse {
        path,
        title: page.title,
        markdown,
    }))
}
