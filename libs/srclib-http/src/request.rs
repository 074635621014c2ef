use crate::client::HttpClient;
use crate::config::TransportSecurity;
use crate::error::{HttpError, UrlRejection};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Request, Uri};
use http_body_util::Full;
use serde::Serialize;

/// A request being assembled against an [`HttpClient`].
///
/// Header errors are held until [`send`](Self::send) so calls chain
/// without intermediate `?`.
#[must_use = "a request is only sent by .send()"]
pub struct RequestBuilder {
    client: HttpClient,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Bytes,
    deferred: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: HttpClient, method: Method, url: &str) -> Self {
        Self {
            client,
            method,
            url: url.to_owned(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            deferred: None,
        }
    }

    /// Set `name` to `value`, replacing earlier values of `name`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.deferred.is_some() {
            return self;
        }
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(e), _) => self.deferred = Some(HttpError::HeaderName(e)),
            (_, Err(e)) => self.deferred = Some(HttpError::HeaderValue(e)),
        }
        self
    }

    /// Send `body` as JSON, adding `Content-Type: application/json` unless
    /// a content type is already set.
    ///
    /// # Errors
    /// Returns `HttpError::Json` if `body` cannot be serialized.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        self.body = Bytes::from(serde_json::to_vec(body)?);
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Send the request through the client's layer stack.
    ///
    /// Every HTTP status comes back as `Ok`; use the checked readers on
    /// [`HttpResponse`] to turn non-2xx statuses into errors.
    ///
    /// # Errors
    /// - a header error held from [`header`](Self::header)
    /// - [`HttpError::Url`] if the URL is malformed or its scheme is refused
    /// - timeout, transport or TLS failures, and `Overloaded` when the
    ///   request queue is full
    pub async fn send(self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.deferred {
            return Err(e);
        }
        let uri = checked_uri(&self.url, self.client.transport)?;

        let mut request = Request::new(Full::new(self.body));
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers;
        self.client.execute(request).await
    }
}

/// Parse an absolute URL and check its scheme against `transport`.
fn checked_uri(url: &str, transport: TransportSecurity) -> Result<Uri, HttpError> {
    let reject = |reason| HttpError::Url {
        url: url.to_owned(),
        reason,
    };

    let uri: Uri = url
        .parse()
        .map_err(|e: http::uri::InvalidUri| reject(UrlRejection::Malformed(e.to_string())))?;

    match (uri.scheme_str(), transport) {
        (Some("https"), _) | (Some("http"), TransportSecurity::AllowInsecureHttp) => {}
        (Some("http"), TransportSecurity::TlsOnly) => return Err(reject(UrlRejection::PlainHttp)),
        (Some(other), _) => {
            return Err(reject(UrlRejection::UnsupportedScheme(other.to_owned())));
        }
        (None, _) => return Err(reject(UrlRejection::Malformed("relative URL".to_owned()))),
    }
    if uri.host().is_none() {
        return Err(reject(UrlRejection::NoHost));
    }
    Ok(uri)
}
