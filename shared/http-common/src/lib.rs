//! Shared HTTP utilities for the URL shortener workspace.
//!
//! Framework-agnostic response bodies, short-URL building, and small parsing
//! helpers used by the api-server.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::SystemTime;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Short link not found",
        "bad_request" => "Bad request",
        "invalid_url" => "Invalid target URL",
        "unauthorized" => "Missing user identity",
        "duplicate_code" => "Short code already taken",
        "exhausted" => "Could not allocate a short code, try again later",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// URL Building
// ============================================================================

/// Build a short URL for `code`.
///
/// A configured `domain` (e.g. `https://sho.rt`) wins; otherwise falls back to
/// `http://{host}/{code}`, or `/{code}` when the host is unknown. Custom codes
/// are arbitrary strings, so the code is percent-encoded.
pub fn build_short_url(domain: Option<&str>, host: &str, code: &str) -> String {
    let code = urlencoding::encode(code);
    match domain.filter(|d| !d.is_empty()) {
        Some(dom) => format!("{}/{}", dom.trim_end_matches('/'), code),
        None if host.is_empty() => format!("/{}", code),
        None => format!("http://{}/{}", host, code),
    }
}

// ============================================================================
// Time Utilities
// ============================================================================

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
pub fn system_time_to_rfc3339(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// Query Parsing
// ============================================================================

/// Page size used when a listing request names none.
pub const DEFAULT_LIMIT: usize = 50;
/// Largest page size a listing request may ask for.
pub const MAX_LIMIT: usize = 500;

/// Validate a requested `limit`: `None` means [`DEFAULT_LIMIT`], otherwise it
/// must be in `1..=MAX_LIMIT`.
pub fn checked_limit(requested: Option<usize>) -> Option<usize> {
    match requested {
        None => Some(DEFAULT_LIMIT),
        Some(n) if (1..=MAX_LIMIT).contains(&n) => Some(n),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_json_err() {
        let err = json_err("not_found");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "not_found", "message": "Short link not found"}})
        );

        // Unknown code falls back to code as message
        let err = json_err("custom_error");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "custom_error", "message": "custom_error"}})
        );
    }

    #[test]
    fn test_json_error_with_message() {
        let err = json_error_with_message("invalid_url", "invalid url: empty");
        assert_eq!(
            err,
            serde_json::json!({"error": {"code": "invalid_url", "message": "invalid url: empty"}})
        );
    }

    #[test]
    fn test_build_short_url() {
        assert_eq!(
            build_short_url(None, "example.com", "abc"),
            "http://example.com/abc"
        );
        assert_eq!(build_short_url(None, "", "abc"), "/abc");
        assert_eq!(
            build_short_url(Some("https://sho.rt/"), "example.com", "abc"),
            "https://sho.rt/abc"
        );
        assert_eq!(
            build_short_url(Some(""), "example.com", "abc"),
            "http://example.com/abc"
        );
        assert_eq!(
            build_short_url(Some("https://sho.rt"), "", "a b/c"),
            "https://sho.rt/a%20b%2Fc"
        );
    }

    #[test]
    fn test_system_time_to_rfc3339() {
        assert_eq!(system_time_to_rfc3339(UNIX_EPOCH), "1970-01-01T00:00:00Z");
        assert_eq!(
            system_time_to_rfc3339(UNIX_EPOCH + Duration::from_secs(86_400 + 61)),
            "1970-01-02T00:01:01Z"
        );
    }

    #[test]
    fn test_checked_limit() {
        assert_eq!(checked_limit(None), Some(DEFAULT_LIMIT));
        assert_eq!(checked_limit(Some(1)), Some(1));
        assert_eq!(checked_limit(Some(500)), Some(500));
        assert_eq!(checked_limit(Some(0)), None);
        assert_eq!(checked_limit(Some(501)), None);
    }
}
