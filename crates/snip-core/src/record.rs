use crate::error::ValidationError;
use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

const MIN_URL_LENGTH: usize = 4;
const ANONYMOUS_OWNER: &str = "default";

/// Opaque identifier of the user that created a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The sentinel owner used when no authenticated user is present.
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_OWNER.to_owned())
    }

    /// Resolves an optional authenticated user to an owner, falling back to
    /// [`Owner::anonymous`].
    pub fn or_anonymous(owner: Option<Owner>) -> Self {
        owner.unwrap_or_else(Self::anonymous)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored URL record.
///
/// This is also the on-disk shape of one line in the file backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The short code assigned by the store.
    pub id: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The user that created the record.
    pub owner: Owner,
    /// Client token echoed back in batch responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Soft-delete flag.
    #[serde(default)]
    pub is_deleted: bool,
}

/// A validated request to shorten a URL.
///
/// Construction validates the URL, so stores never see malformed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrl {
    original_url: String,
    owner: Owner,
    correlation_id: Option<String>,
}

impl NewUrl {
    pub fn new(original_url: impl Into<String>, owner: Owner) -> Result<Self, ValidationError> {
        let original_url = original_url.into();
        validate_url(&original_url)?;
        Ok(Self {
            original_url,
            owner,
            correlation_id: None,
        })
    }

    /// Attaches the client's correlation token for batch responses.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Turns the request into a live record under the given code.
    pub fn into_record(self, id: ShortCode) -> UrlRecord {
        UrlRecord {
            id,
            original_url: self.original_url,
            owner: self.owner,
            correlation_id: self.correlation_id,
            is_deleted: false,
        }
    }
}

fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::Empty);
    }
    if url.chars().any(char::is_whitespace) {
        return Err(ValidationError::ContainsWhitespace);
    }
    let len = url.chars().count();
    if len < MIN_URL_LENGTH {
        return Err(ValidationError::TooShort {
            min: MIN_URL_LENGTH,
            len,
        });
    }
    Ok(())
}
