//! Webhook signature verification using HMAC-SHA256.
//!
//! The sender signs the raw request body with a shared secret and sends the
//! result in the `X-Hub-Signature-256` header as `sha256=<hex>`, using
//! lowercase hex digits. Verification must run on the exact bytes received,
//! before any parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Parses a signature header (e.g., "sha256=abc123...") into raw bytes.
///
/// Only lowercase hex is accepted, matching the format the sender produces.
/// Returns `None` for malformed headers. Never panics.
///
/// # Examples
///
/// ```
/// use pagesync::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=abcd1234"), Some(vec![0xab, 0xcd, 0x12, 0x34]));
///
/// // Missing prefix, wrong algorithm, uppercase or invalid hex
/// assert!(parse_signature_header("abcd1234").is_none());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=ABCD1234").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix(SIGNATURE_PREFIX)?;
    if !hex_sig.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 signature of a payload using the given secret.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a header value: `sha256=<lowercase hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", hex::encode(signature))
}

/// Verifies a webhook signature against the payload and secret.
///
/// Uses constant-time comparison of the MAC.
///
/// ```
/// use pagesync::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = b"{\"ref\":\"refs/heads/main\"}";
/// let header = format_signature_header(&compute_signature(payload, b"secret"));
///
/// assert!(verify_signature(payload, &header, b"secret"));
/// assert!(!verify_signature(payload, &header, b"other-secret"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected_signature) = parse_signature_header(signature_header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);

    mac.verify_slice(&expected_signature).is_ok()
}
