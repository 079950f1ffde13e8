//! Error types for the harvester.
//!
//! Failures fall into two buckets with very different consequences:
//!
//! - [`SetupError`]: configuration or sink-bootstrap problems detected before
//!   any feed work starts. These are fatal — `main` propagates them and the
//!   process exits with code 1.
//! - [`HarvestError`]: per-feed, per-entry, per-image, or per-row problems
//!   encountered mid-run. These are logged and the offending item is skipped;
//!   they never abort the run.

use thiserror::Error;

/// Fatal errors raised while assembling the run configuration or connecting
/// the destination sink. Anything of this kind terminates the process before
/// network work begins.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A required environment variable or flag is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// A configuration value was present but unusable.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// The flag or environment variable at fault.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The service-account credential JSON could not be parsed.
    #[error("credential JSON parse failed: {0}")]
    BadCredentials(#[from] serde_json::Error),

    /// The credential private key could not be loaded for signing.
    #[error("credential key rejected: {0}")]
    BadKey(#[from] jsonwebtoken::errors::Error),

    /// The output directory is missing or not writable.
    #[error("output path unusable: {0}")]
    OutputPath(#[from] std::io::Error),

    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    HttpClient(reqwest::Error),

    /// The spreadsheet could not be opened or the worksheet created.
    #[error("sheet bootstrap failed: {0}")]
    SheetBootstrap(String),
}

/// Recoverable errors attached to a single feed, entry, image, or sink row.
/// Callers log these and continue the run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Remote service answered with a non-success status.
    #[error("http status {status} from {context}")]
    BadStatus {
        /// HTTP status code returned.
        status: u16,
        /// What was being fetched.
        context: String,
    },

    /// The payload could not be parsed as a feed, page, or API response.
    #[error("parse failed: {0}")]
    ParseFailed(String),

    /// An image payload could not be decoded or re-encoded.
    #[error("image processing failed: {0}")]
    ImageFailed(String),

    /// A sink rejected a single row append.
    #[error("sink append failed: {0}")]
    SinkAppend(String),
}

impl From<reqwest::Error> for HarvestError {
    fn from(e: reqwest::Error) -> Self {
        HarvestError::RequestFailed(e.to_string())
    }
}

impl From<image::ImageError> for HarvestError {
    fn from(e: image::ImageError) -> Self {
        HarvestError::ImageFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_error_messages_name_the_field() {
        let e = SetupError::InvalidConfig {
            field: "GOOGLE_SHEETS_ID",
            reason: "empty".to_string(),
        };
        assert!(e.to_string().contains("GOOGLE_SHEETS_ID"));
    }

    #[test]
    fn harvest_error_wraps_status() {
        let e = HarvestError::BadStatus {
            status: 503,
            context: "https://example.com/feed".to_string(),
        };
        assert!(e.to_string().contains("503"));
        assert!(e.to_string().contains("example.com"));
    }
}
