//! Utility functions for the tutor session SDK
//!
//! Helpers for turning backend response bodies into short, UTF-8 safe
//! messages fit for logs and `AuthState::error`.

/// Longest backend message carried into an error
pub const MAX_ERROR_MESSAGE_BYTES: usize = 200;

/// Safely truncate a string at a UTF-8 character boundary.
///
/// Returns a slice of at most `max_bytes` bytes, ensuring the result
/// is valid UTF-8 by finding the last valid character boundary.
///
/// # Example
/// ```
/// use tutor_session_sdk::utils::safe_truncate;
///
/// // Emoji is 4 bytes - truncating at byte 10 would cut it in half
/// let text = "Status: 🔍 Active";
/// let result = safe_truncate(text, 10);
/// assert_eq!(result, "Status: "); // Stops before the emoji
/// ```
#[inline]
#[must_use]
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    &s[..boundary]
}

/// Truncate a string for display with ellipsis.
///
/// # Example
/// ```
/// use tutor_session_sdk::utils::truncate_for_display;
///
/// let text = "This is a long message";
/// let result = truncate_for_display(text, 10);
/// assert_eq!(result, "This is a ...");
/// ```
#[must_use]
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    let truncated = safe_truncate(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Looks for `detail`, `message`, then `error` in a JSON object (a `detail`
/// list of validation errors uses its first `msg`), falling back to the raw
/// body and finally to `fallback` when the body is empty.
#[must_use]
pub fn error_message_from_body(body: &str, fallback: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return fallback.to_string();
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            match map.get(key) {
                Some(serde_json::Value::String(msg)) if !msg.is_empty() => {
                    return truncate_for_display(msg, MAX_ERROR_MESSAGE_BYTES);
                }
                Some(serde_json::Value::Array(items)) => {
                    if let Some(msg) = items
                        .first()
                        .and_then(|item| item.get("msg"))
                        .and_then(serde_json::Value::as_str)
                    {
                        return truncate_for_display(msg, MAX_ERROR_MESSAGE_BYTES);
                    }
                }
                _ => {}
            }
        }
    }

    truncate_for_display(body, MAX_ERROR_MESSAGE_BYTES)
}
