use std::time::Duration;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a URL was refused before any connection was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum UrlRejection {
    #[error("malformed URL: {0}")]
    Malformed(String),
    #[error("URL has no host")]
    NoHost,
    #[error("unsupported scheme {0}")]
    UnsupportedScheme(String),
    #[error("plain http:// is not allowed; use https://")]
    PlainHttp,
}

/// Errors from building, sending or reading an HTTP request.
///
/// Non-2xx statuses are not errors until a checked reader
/// (`json`, `text`, `error_for_status`) is used.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("rejecting {url}: {reason}")]
    Url { url: String, reason: UrlRejection },

    #[error("invalid header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("sending request: {0}")]
    Transport(#[source] BoxError),

    #[error("configuring TLS: {0}")]
    Tls(#[source] BoxError),

    /// `actual` is the size reached when reading stopped, not the full body.
    #[error("response body exceeds {limit} bytes (read {actual})")]
    BodyTooLarge { limit: usize, actual: usize },

    #[error("server returned {status}{}", preview_suffix(.body_preview))]
    Status {
        status: http::StatusCode,
        /// Start of the error body; empty when the body was not read
        body_preview: String,
        content_type: Option<String>,
    },

    #[error("decoding JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// The request queue is full; nothing was sent.
    #[error("request queue is full")]
    Overloaded,

    #[error("HTTP client worker has shut down")]
    ServiceClosed,
}

fn preview_suffix(preview: &str) -> String {
    if preview.is_empty() {
        String::new()
    } else {
        format!(": {preview}")
    }
}
