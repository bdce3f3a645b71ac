//! Input validation helpers. Pure functions, no IO.

use url::Url;

use crate::{ShortCode, UrlRejection};

/// Maximum accepted length of a target URL, in characters.
pub const MAX_URL_LEN: usize = 2000;

/// Normalize and validate a target URL.
///
/// Scheme-less input gets `http://` prepended before validation. The result
/// must parse, use `http` or `https`, and carry a non-empty host. The returned
/// string is the parser's serialization, so it always spells out `//host` and
/// never carries raw control characters.
pub fn normalize_target_url(raw: &str) -> Result<String, UrlRejection> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlRejection::Empty);
    }
    check_len(trimmed)?;

    let candidate = if has_explicit_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    check_len(&candidate)?;

    let parsed = Url::parse(&candidate).map_err(|e| UrlRejection::Malformed(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::UnsupportedScheme(other.to_string())),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(UrlRejection::MissingHost);
    }
    let normalized = String::from(parsed);
    check_len(&normalized)?;
    Ok(normalized)
}

/// Turn a requested custom code into a code; blank requests count as absent.
pub fn custom_code(raw: Option<&str>) -> Option<ShortCode> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ShortCode::new)
}

fn check_len(s: &str) -> Result<(), UrlRejection> {
    if s.chars().count() > MAX_URL_LEN {
        return Err(UrlRejection::TooLong { max: MAX_URL_LEN });
    }
    Ok(())
}

// `scheme:` prefix per RFC 3986, except `host:port` forms such as
// `localhost:8080` (digit after the colon) and `user:pass@host` forms
// (an `@` before the first `/`).
fn has_explicit_scheme(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let authority = rest.split('/').next().unwrap_or("");
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.starts_with(|c: char| c.is_ascii_digit())
        && !authority.contains('@')
}
