use pmx_common::ResourceType;

/// Maximum number of bytes of an upstream body kept in error messages.
const MAX_BODY_BYTES: usize = 200;

/// Errors that can occur when talking to Unisphere or interpreting its replies.
///
/// Only [`UnisphereError::is_startup_fatal`] variants are meant to stop the
/// process; everything else is reported per collection unit and skipped.
///
/// # Examples
///
/// ```rust
/// use pmx_unisphere::error::UnisphereError;
///
/// let err = UnisphereError::ArrayNotManaged { symm_id: "000197900123".to_string() };
/// assert!(err.to_string().contains("000197900123"));
/// assert!(err.is_startup_fatal());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum UnisphereError {
    /// The request never produced an HTTP response (connect, TLS, timeout...).
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Unisphere answered with a non-2xx status.
    #[error("Unisphere API HTTP error: status={status}, body={body}")]
    HttpStatus { status: u16, body: String },

    /// The body could not be decoded as the expected JSON document.
    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The body decoded but does not have the expected structure.
    #[error("Unexpected response format: {0}")]
    UnexpectedShape(String),

    #[error("No PowerMax array is managed by this Unisphere")]
    NoArraysManaged,

    #[error("PowerMax {symm_id} is not managed by this Unisphere")]
    ArrayNotManaged { symm_id: String },

    #[error("No {0} resource exists")]
    NoInstances(ResourceType),

    #[error("Request throttle closed")]
    ThrottleClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl UnisphereError {
    /// Builds an [`UnisphereError::HttpStatus`] keeping at most a short prefix
    /// of the body.
    pub fn http_status(status: u16, body: &[u8]) -> Self {
        Self::HttpStatus {
            status,
            body: body_snippet(body),
        }
    }

    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoArraysManaged | Self::ArrayNotManaged { .. } | Self::NoInstances(_)
        )
    }
}

/// Truncate a body to at most [`MAX_BODY_BYTES`] bytes on a char boundary.
fn body_snippet(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_BODY_BYTES {
        return text.into_owned();
    }
    let mut end = MAX_BODY_BYTES;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, UnisphereError>;
