//! HTTP server for the content sync service.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts push webhooks (202 when a sync is scheduled)
//! - `GET /health` - Returns 200 if the server is running
//! - `GET /api/pages` - Navigation entries for visible pages
//! - `GET /api/pages/{*path}` - A single visible page with its markdown source
//! - `GET /api/pages/` - The home page
//!
//! When an admin token is configured, the following are also mounted and
//! require `Authorization: Bearer <token>`:
//!
//! - `GET /admin/pages` - Every registered page
//! - `POST /admin/pages/toggle/{*path}` - Flips a page's visibility
//! - `GET /admin/sync` - The latest sync report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::registry::{PageRegistry, RegistryError, RegistryResult};
use crate::sync::SyncHandle;
use crate::types::InvalidPagePath;

pub mod admin;
pub mod health;
pub mod pages;
pub mod webhook;

pub use health::health_handler;
pub use pages::{home_page_handler, list_pages_handler, page_handler};
pub use webhook::webhook_handler;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,

    registry: Arc<PageRegistry>,

    /// Handle to the background sync worker.
    sync: SyncHandle,

    /// Working copy holding the markdown sources.
    content_root: PathBuf,

    /// Bearer token for the admin routes, if enabled.
    admin_token: Option<String>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// Admin routes are mounted only when `admin_token` is `Some`.
    pub fn new(
        webhook_secret: impl Into<Vec<u8>>,
        registry: Arc<PageRegistry>,
        sync: SyncHandle,
        content_root: impl Into<PathBuf>,
        admin_token: Option<String>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                registry,
                sync,
                content_root: content_root.into(),
                admin_token,
            }),
        }
    }

    /// Returns the webhook secret.
    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn registry(&self) -> &Arc<PageRegistry> {
        &self.inner.registry
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.inner.sync
    }

    pub fn content_root(&self) -> &Path {
        &self.inner.content_root
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.inner.admin_token.as_deref()
    }
}

/// Errors returned by the page and admin endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("invalid page path: {0}")]
    InvalidPath(#[from] InvalidPagePath),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            ApiError::InvalidPath(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                self.to_string(),
            )
                .into_response(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

/// Runs a registry call on the blocking pool.
pub(crate) async fn with_registry<T, F>(app_state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&PageRegistry) -> RegistryResult<T> + Send + 'static,
    T: Send + 'static,
{
    let registry = Arc::clone(app_state.registry());
    Ok(tokio::task::spawn_blocking(move || f(registry.as_ref())).await??)
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> Router {
    use axum::routing::{get, post};

    let mut router = Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/api/pages", get(list_pages_handler))
        .route("/api/pages/", get(home_page_handler))
        .route("/api/pages/{*path}", get(page_handler));

    if app_state.admin_token().is_some() {
        router = router.nest("/admin", admin::router(app_state.clone()));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}



#[cfg(test)]
mod integration_tests {
    use super::test_support::{ADMIN_TOKEN, SECRET, TestServer};
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::test_utils::{push_payload, signature_for};
    use crate::types::PagePath;

    fn push_request(git_ref: &str) -> Request<Body> {
        let body = push_payload(git_ref);
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-github-event", "push")
            .header("x-hub-signature-256", signature_for(&body, SECRET))
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_returns_200() {
        let server = TestServer::start();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn untracked_branch_push_does_not_sync() {
        let server = TestServer::synced().await;
        let requested = server.state.sync().requested();
        server.upstream.add_page("draft.md", "# Draft");

        let response = server
            .router()
            .oneshot(push_request("refs/heads/develop"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.state.sync().requested(), requested);
        assert!(
            server
                .registry
                .get_by_path(&PagePath::new("draft.md"))
                .is_err()
        );
    }

    #[tokio::test]
    async fn main_push_syncs_new_pages() {
        let server = TestServer::synced().await;
        server.upstream.add_page("blog/new-post.md", "# New post");

        let response = server
            .router()
            .oneshot(push_request("refs/heads/main"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let ticket = server.state.sync().requested();
        let report = server.state.sync().wait_for(ticket).await.unwrap();
        assert!(report.is_success());

        let paths: Vec<_> = server
            .registry
            .list_all()
            .unwrap()
            .into_iter()
            .map(|p| p.path.as_str().to_string())
            .collect();
        assert!(paths.contains(&"blog/new-post.md".to_string()), "{paths:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn simultaneous_deliveries_converge() {
        let server = TestServer::synced().await;
        server.upstream.add_page("first.md", "# First");

        let router = server.router();
        let (a, b) = tokio::join!(
            router.clone().oneshot(push_request("refs/heads/main")),
            router.clone().oneshot(push_request("refs/heads/master")),
        );
        assert_eq!(a.unwrap().status(), StatusCode::ACCEPTED);
        assert_eq!(b.unwrap().status(), StatusCode::ACCEPTED);

        server.upstream.add_page("second.md", "# Second");
        let response = router.oneshot(push_request("refs/heads/main")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let ticket = server.state.sync().requested();
        let report = server.state.sync().wait_for(ticket).await.unwrap();
        assert!(report.is_success());

        for path in ["home.md", "first.md", "second.md"] {
            assert!(
                server.registry.get_by_path(&PagePath::new(path)).is_ok(),
                "{path} missing"
            );
        }
        assert_eq!(server.registry.list_all().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn pages_list_and_fetch() {
        let server = TestServer::start();
        server.upstream.add_page("blog/my-first-post.md", "# Hello\n");
        let ticket = server.state.sync().request();
        server.state.sync().wait_for(ticket).await.unwrap();

        let request = Request::builder()
            .uri("/api/pages")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!([
                { "path": "blog/my-first-post", "title": "My First Post" },
                { "path": "/", "title": "Home" },
            ])
        );

        let request = Request::builder()
            .uri("/api/pages/blog/my-first-post")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "path": "blog/my-first-post.md",
                "title": "My First Post",
                "markdown": "# Hello\n",
            })
        );
    }

    #[tokio::test]
    async fn admin_requires_bearer_token() {
        let server = TestServer::synced().await;

        for auth in [None, Some("Bearer wrong"), Some("Basic YWRtaW4=")] {
            let mut builder = Request::builder().uri("/admin/pages");
            if let Some(auth) = auth {
                builder = builder.header("authorization", auth);
            }
            let response = server
                .router()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{auth:?}");
        }

        let request = Request::builder()
            .uri("/admin/pages")
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_absent_without_token() {
        let server = TestServer::start();
        let state = AppState::new(
            SECRET,
            Arc::clone(&server.registry),
            server.state.sync().clone(),
            server.state.content_root(),
            None,
        );

        let request = Request::builder()
            .uri("/admin/pages")
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = build_router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn hidden_page_disappears_from_public_api() {
        let server = TestServer::synced().await;

        let request = Request::builder()
            .method("POST")
            .uri("/admin/pages/toggle/home")
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "path": "home.md", "is_visible": false })
        );

        let request = Request::builder()
            .uri("/api/pages/home")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder()
            .uri("/api/pages")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }
}
