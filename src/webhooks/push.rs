//! Push event inspection.
//!
//! Only the `ref` field of a push payload matters here: pushes to a tracked
//! branch trigger a sync, everything else is acknowledged and ignored.

use serde_json::Value;

/// Branch references whose pushes trigger a sync.
pub const TRACKED_REFS: [&str; 2] = ["refs/heads/main", "refs/heads/master"];

/// Returns true if `git_ref` names a tracked branch.
pub fn is_tracked_ref(git_ref: &str) -> bool {
    TRACKED_REFS.contains(&git_ref)
}

/// Extracts the `ref` field from a push payload.
///
/// Returns `None` when the payload is not an object or `ref` is missing or
/// not a string.
pub fn push_ref(payload: &Value) -> Option<&str> {
    payload.get("ref").and_then(Value::as_str)
}
