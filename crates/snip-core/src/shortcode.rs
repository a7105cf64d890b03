use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A short code identifying a stored URL.
///
/// Codes are produced by a store's generator and are opaque to callers;
/// incoming codes (e.g. from a redirect path) are wrapped as-is and simply
/// fail to resolve when unknown.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Wraps a code without any checks.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Whether the code can be used verbatim as a URL path segment.
    ///
    /// Only RFC 3986 unreserved characters are accepted.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ShortCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ShortCode {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_safe_codes() {
        assert!(ShortCode::new("0123abcdef").is_path_safe());
        assert!(ShortCode::new("Abc-123_x.y~z").is_path_safe());
    }

    #[test]
    fn path_unsafe_codes() {
        assert!(!ShortCode::new("").is_path_safe());
        assert!(!ShortCode::new("abc/def").is_path_safe());
        assert!(!ShortCode::new("ab+cd==").is_path_safe());
        assert!(!ShortCode::new("abc def").is_path_safe());
        assert!(!ShortCode::new("abc?x").is_path_safe());
    }

    #[test]
    fn to_url_trims_trailing_slash() {
        let code = ShortCode::new("abc123");
        assert_eq!(code.to_url("http://localhost:8080"), "http://localhost:8080/abc123");
        assert_eq!(code.to_url("http://localhost:8080/"), "http://localhost:8080/abc123");
    }

    #[test]
    fn serializes_as_plain_string() {
        let code = ShortCode::new("abc123");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"abc123\"");
    }
}
