//! Webhook endpoint handler.
//!
//! Authenticates push deliveries and, for tracked branches, asks the sync
//! worker for a run. The response is sent as soon as the request is queued;
//! the pull and reconciliation happen in the background.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use super::AppState;
use crate::webhooks::{DeliveryDecision, WebhookError, authenticate_delivery};

/// Header name for the event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for the delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for the signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingSignature => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::FORBIDDEN,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 202 Accepted: push to a tracked branch, sync scheduled
/// - 200 OK: authentic delivery for any other ref
/// - 400 Bad Request: missing signature or body is not JSON
/// - 403 Forbidden: signature mismatch
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let delivery = header_str(&headers, HEADER_DELIVERY).unwrap_or("-");
    let event = header_str(&headers, HEADER_EVENT).unwrap_or("-");
    debug!(delivery, event, bytes = body.len(), "Received webhook");

    // Blank counts as missing. Non-ASCII can never match.
    let signature = headers
        .get(HEADER_SIGNATURE)
        .map(|v| v.to_str().unwrap_or("?"))
        .filter(|v| !v.trim().is_empty());

    match authenticate_delivery(&body, signature, app_state.webhook_secret()) {
        Ok(DeliveryDecision::Sync { git_ref }) => {
            let ticket = app_state.sync().request();
            info!(delivery, git_ref = %git_ref, ticket, "Push to tracked branch, sync requested");
            Ok((StatusCode::ACCEPTED, "Accepted"))
        }
        Ok(DeliveryDecision::Ignore { git_ref }) => {
            debug!(delivery, git_ref = ?git_ref, "Ignoring push to untracked ref");
            Ok((StatusCode::OK, "Ignored"))
        }
        Err(e) => {
            warn!(delivery, error = %e, "Rejected webhook delivery");
            Err(e)
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
