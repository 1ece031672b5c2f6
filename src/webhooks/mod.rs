//! Authentication and filtering of inbound push webhooks.
//!
//! A delivery passes through three checks, in order:
//! 1. The signature header must be present.
//! 2. The signature must match the HMAC-SHA256 of the raw body.
//! 3. The body must be JSON.
//!
//! An authentic delivery is then classified by its `ref`: pushes to a tracked
//! branch ask for a sync, anything else is acknowledged without action.

pub mod push;
pub mod signature;

use thiserror::Error;

pub use push::{TRACKED_REFS, is_tracked_ref, push_ref};
pub use signature::{
    SIGNATURE_PREFIX, compute_signature, format_signature_header, parse_signature_header,
    verify_signature,
};

/// Why a delivery was rejected.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No signature header was sent.
    #[error("missing signature")]
    MissingSignature,

    /// The signature does not match the body.
    #[error("invalid signature")]
    InvalidSignature,

    /// The body is not valid JSON.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// What to do with an authentic delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryDecision {
    /// Push to a tracked branch: schedule a sync.
    Sync { git_ref: String },
    /// Anything else: acknowledge and do nothing.
    Ignore { git_ref: Option<String> },
}

/// Authenticates a delivery and decides whether it should trigger a sync.
///
/// `body` must be the exact bytes received.
pub fn authenticate_delivery(
    body: &[u8],
    signature_header: Option<&str>,
    secret: &[u8],
) -> Result<DeliveryDecision, WebhookError> {
    let signature_header = signature_header.ok_or(WebhookError::MissingSignature)?;

    if !verify_signature(body, signature_header, secret) {
        return Err(WebhookError::InvalidSignature);
    }

    let payload: serde_json::Value = serde_json::from_slice(body)?;

    match push_ref(&payload) {
        Some(git_ref) if is_tracked_ref(git_ref) => Ok(DeliveryDecision::Sync {
            git_ref: git_ref.to_string(),
        }),
        other => Ok(DeliveryDecision::Ignore {
            git_ref: other.map(str::to_string),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{push_payload, signature_for};

    const SECRET: &[u8] = b"webhook-secret";

    #[test]
    fn tracked_push_requests_sync() {
        let body = push_payload("refs/heads/main");
        let sig = signature_for(&body, SECRET);

        let decision = authenticate_delivery(&body, Some(&sig), SECRET).unwrap();

        assert_eq!(
            decision,
            DeliveryDecision::Sync {
                git_ref: "refs/heads/main".to_string()
            }
        );
    }

    #[test]
    fn master_is_tracked() {
        let body = push_payload("refs/heads/master");
        let sig = signature_for(&body, SECRET);

        let decision = authenticate_delivery(&body, Some(&sig), SECRET).unwrap();

        assert!(matches!(decision, DeliveryDecision::Sync { .. }));
    }

    #[test]
    fn untracked_push_is_ignored() {
        let body = push_payload("refs/heads/develop");
        let sig = signature_for(&body, SECRET);

        let decision = authenticate_delivery(&body, Some(&sig), SECRET).unwrap();

        assert_eq!(
            decision,
            DeliveryDecision::Ignore {
                git_ref: Some("refs/heads/develop".to_string())
            }
        );
    }

    #[test]
    fn payload_without_ref_is_ignored() {
        let body = br#"{"zen":"Design for failure."}"#;
        let sig = signature_for(body, SECRET);

        let decision = authenticate_delivery(body, Some(&sig), SECRET).unwrap();

        assert_eq!(decision, DeliveryDecision::Ignore { git_ref: None });
    }

    #[test]
    fn missing_signature_is_rejected_before_parsing() {
        let result = authenticate_delivery(b"not json", None, SECRET);
        assert!(matches!(result, Err(WebhookError::MissingSignature)));
    }

    #[test]
    fn bad_signature_is_rejected_before_parsing() {
        let body = b"not json";
        let sig = signature_for(body, b"other-secret");

        let result = authenticate_delivery(body, Some(&sig), SECRET);

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn signed_garbage_is_invalid_payload() {
        let body = b"not json";
        let sig = signature_for(body, SECRET);

        let result = authenticate_delivery(body, Some(&sig), SECRET);

        assert!(matches!(result, Err(WebhookError::InvalidPayload(_))));
    }

    #[test]
    fn signature_covers_exact_bytes() {
        let body = push_payload("refs/heads/main");
        let sig = signature_for(&body, SECRET);
        let mut reformatted = body.clone();
        reformatted.push(b'\n');

        let result = authenticate_delivery(&reformatted, Some(&sig), SECRET);

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }
}
