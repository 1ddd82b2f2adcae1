//! Authorization code extraction from pasted redirect URLs.

use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

use crate::error::AuthError;

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("Invalid URL regex"));

/// Extract an authorization code from user input.
///
/// Accepts either the full redirect URL the provider sent the browser to, or
/// the bare code. Bare codes are returned as-is after trimming; the provider
/// is the one that rejects malformed codes.
///
/// # Examples
///
/// ```
/// use box_catalog::redirect::extract_code;
///
/// let code = extract_code("http://localhost:8501/?code=abc123&state=xyz").unwrap();
/// assert_eq!(code, "abc123");
///
/// let code = extract_code("abc123").unwrap();
/// assert_eq!(code, "abc123");
/// ```
pub fn extract_code(input: &str) -> Result<String, AuthError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AuthError::EmptyCode);
    }

    if !URL_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    let url = Url::parse(trimmed).map_err(|_| AuthError::InvalidRedirect(trimmed.to_string()))?;

    let mut code = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            "error_description" if error_description.is_none() => {
                error_description = Some(value.into_owned())
            }
            _ => {}
        }
    }

    if let Some(code) = code.filter(|c| !c.is_empty()) {
        return Ok(code);
    }

    if let Some(error) = error {
        return Err(AuthError::AuthorizationDenied(
            error_description.unwrap_or(error),
        ));
    }

    Err(AuthError::InvalidRedirect(trimmed.to_string()))
}
