use crate::cache::X_FROM_CACHE;
use crate::error::HttpError;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// Bytes of an error body kept in `HttpError::Status`.
const ERROR_PREVIEW_BYTES: usize = 8 * 1024;

/// Body type flowing through every layer: a network body, possibly
/// decompressed, or one replayed from the disk cache.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// A response from the srclib transport.
///
/// `bytes` reads the body whatever the status; `json` and `text` turn a
/// non-2xx status into `HttpError::Status` with a preview of the body.
/// Every read stops at the client's `max_body_size`.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the disk cache answered, including after a `304 Not Modified`.
    #[must_use]
    pub fn is_from_cache(&self) -> bool {
        self.inner.headers().contains_key(X_FROM_CACHE)
    }

    /// Fail on a non-2xx status without reading the body.
    ///
    /// # Errors
    /// Returns `HttpError::Status` with an empty preview.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        let status = self.inner.status();
        if status.is_success() {
            return Ok(self);
        }
        Err(HttpError::Status {
            status,
            body_preview: String::new(),
            content_type: content_type(self.inner.headers()),
        })
    }

    /// Read the whole body whatever the status.
    ///
    /// # Errors
    /// Returns `HttpError::BodyTooLarge` past `max_body_size`, or
    /// `HttpError::Transport` if the connection fails mid-body.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_body_limited(self.inner, self.max_body_size).await
    }

    /// Decode a 2xx body as JSON.
    ///
    /// # Errors
    /// `HttpError::Status` for other statuses, `HttpError::Json` when the
    /// body does not decode as `T`, plus the errors of [`bytes`](Self::bytes).
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let body = success_body(self.inner, self.max_body_size).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read a 2xx body as lossy UTF-8.
    ///
    /// # Errors
    /// `HttpError::Status` for other statuses, plus the errors of
    /// [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, HttpError> {
        let body = success_body(self.inner, self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn success_body(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let status = response.status();
    if status.is_success() {
        return read_body_limited(response, max_body_size).await;
    }

    let content_type = content_type(response.headers());
    // An oversized error body still yields the status error.
    let body_preview =
        match read_body_limited(response, max_body_size.min(ERROR_PREVIEW_BYTES)).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
            Err(e) => return Err(e),
        };

    Err(HttpError::Status {
        status,
        body_preview,
        content_type,
    })
}

/// Collect a body into memory, failing once it passes `limit` bytes.
///
/// The limit counts decompressed bytes.
pub async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        let Some(chunk) = frame.data_ref() else {
            continue;
        };
        let actual = collected.len() + chunk.len();
        if actual > limit {
            return Err(HttpError::BodyTooLarge { limit, actual });
        }
        collected.extend_from_slice(chunk);
    }

    Ok(Bytes::from(collected))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http_body_util::Full;
    use std::convert::Infallible;

    fn response(status: u16, body: &'static str) -> HttpResponse {
        let body: ResponseBody = Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(|never: Infallible| match never {})
            .boxed();
        HttpResponse {
            inner: Response::builder()
                .status(status)
                .header("content-type", "text/plain")
                .body(body)
                .unwrap(),
            max_body_size: 16,
        }
    }

    #[tokio::test]
    async fn test_text_reads_success_body() {
        let text = response(200, "hello").text().await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_text_reports_status_with_preview() {
        let err = response(404, "not found").text().await.unwrap_err();
        match err {
            HttpError::Status {
                status,
                body_preview,
                content_type,
            } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body_preview, "not found");
                assert_eq!(content_type.as_deref(), Some("text/plain"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_error_body_keeps_status() {
        let err = response(500, "this body is longer than sixteen bytes")
            .text()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HttpError::Status { status: StatusCode::INTERNAL_SERVER_ERROR, ref body_preview, .. }
                if body_preview == "<body too large for preview>"
        ));
    }

    #[tokio::test]
    async fn test_bytes_enforces_limit() {
        let err = response(200, "this body is longer than sixteen bytes")
            .bytes()
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { limit: 16, .. }));
    }

    #[test]
    fn test_error_for_status_passes_success_through() {
        assert!(response(200, "").error_for_status().is_ok());
        assert!(matches!(
            response(503, "").error_for_status(),
            Err(HttpError::Status { .. })
        ));
    }

    #[test]
    fn test_is_from_cache_reads_marker_header() {
        let mut resp = response(200, "");
        assert!(!resp.is_from_cache());
        resp.inner
            .headers_mut()
            .insert(X_FROM_CACHE, http::HeaderValue::from_static("1"));
        assert!(resp.is_from_cache());
    }
}
