use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::header::AUTHORIZATION;
use http::{HeaderValue, Request, Response};
use srclib_http::HttpError;
use tower::{Layer, Service};
use zeroize::Zeroizing;

use crate::types::{Credential, Ticket};

#[derive(Clone, Debug)]
enum Scheme {
    Ticket(Ticket),
    Basic(Credential),
}

impl Scheme {
    fn header_value(&self) -> Result<HeaderValue, HttpError> {
        let raw = match self {
            Self::Ticket(ticket) => Zeroizing::new(format!("Sourcegraph-Ticket {}", ticket.expose())),
            Self::Basic(credential) => {
                let pair = Zeroizing::new(format!(
                    "{}:{}",
                    credential.uid(),
                    credential.key().expose()
                ));
                Zeroizing::new(format!("Basic {}", STANDARD.encode(pair.as_bytes())))
            }
        };
        let mut value = HeaderValue::from_str(&raw)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Tower layer that appends `Authorization: Sourcegraph-Ticket <ticket>`.
///
/// Existing `Authorization` values are kept, so a ticket can travel
/// alongside user credentials.
#[derive(Clone, Debug)]
pub struct TicketAuthLayer {
    ticket: Ticket,
}

impl TicketAuthLayer {
    #[must_use]
    pub fn new(ticket: Ticket) -> Self {
        Self { ticket }
    }
}

impl<S> Layer<S> for TicketAuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            scheme: Scheme::Ticket(self.ticket.clone()),
        }
    }
}

/// Tower layer that sets `Authorization: Basic base64(<uid>:<key>)`.
///
/// Any `Authorization` values already on the request are replaced.
#[derive(Clone, Debug)]
pub struct BasicAuthLayer {
    credential: Credential,
}

impl BasicAuthLayer {
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl<S> Layer<S> for BasicAuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            scheme: Scheme::Basic(self.credential.clone()),
        }
    }
}

/// Service created by [`TicketAuthLayer`] and [`BasicAuthLayer`].
///
/// The header value is marked sensitive so it is omitted from HTTP/2 header
/// compression tables and debug output.
#[derive(Clone, Debug)]
pub struct AuthService<S> {
    inner: S,
    scheme: Scheme,
}

impl<S, B, ResBody> Service<Request<B>> for AuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResBody>, HttpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let value = match self.scheme.header_value() {
            Ok(v) => v,
            Err(e) => return Box::pin(async { Err(e) }),
        };

        match self.scheme {
            Scheme::Ticket(_) => {
                req.headers_mut().append(AUTHORIZATION, value);
            }
            Scheme::Basic(_) => {
                req.headers_mut().insert(AUTHORIZATION, value);
            }
        }

        // Clone-swap: the instance that was poll_ready'd handles this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { inner.call(req).await })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Inner service that records every `Authorization` value it receives.
    #[derive(Clone, Default)]
    struct CaptureAuthorization {
        seen: Arc<Mutex<Vec<(String, bool)>>>,
    }

    impl CaptureAuthorization {
        fn values(&self) -> Vec<String> {
            self.seen.lock().unwrap().iter().map(|(v, _)| v.clone()).collect()
        }
    }

    impl Service<Request<Full<Bytes>>> for CaptureAuthorization {
        type Response = Response<Full<Bytes>>;
        type Error = HttpError;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            let mut seen = self.seen.lock().unwrap();
            for value in req.headers().get_all(AUTHORIZATION) {
                seen.push((value.to_str().unwrap().to_owned(), value.is_sensitive()));
            }
            Box::pin(async {
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::new()))
                    .unwrap())
            })
        }
    }

    fn request() -> Request<Full<Bytes>> {
        Request::get("https://sourcegraph.com/api/repos")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn auth_layers_are_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<TicketAuthLayer>();
        assert_traits::<BasicAuthLayer>();
        assert_traits::<AuthService<CaptureAuthorization>>();
    }

    #[tokio::test]
    async fn basic_auth_encodes_uid_and_key() {
        let inner = CaptureAuthorization::default();
        let svc = BasicAuthLayer::new(Credential::new(42, "secret")).layer(inner.clone());

        svc.oneshot(request()).await.unwrap();

        // base64("42:secret")
        assert_eq!(inner.values(), vec!["Basic NDI6c2VjcmV0".to_owned()]);
        assert!(inner.seen.lock().unwrap()[0].1, "header should be sensitive");
    }

    #[tokio::test]
    async fn basic_auth_replaces_existing_authorization() {
        let inner = CaptureAuthorization::default();
        let svc = BasicAuthLayer::new(Credential::new(1, "k")).layer(inner.clone());
        let mut req = request();
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));

        svc.oneshot(req).await.unwrap();

        assert_eq!(inner.values(), vec!["Basic MTpr".to_owned()]);
    }

    #[tokio::test]
    async fn ticket_auth_appends_to_existing_authorization() {
        let inner = CaptureAuthorization::default();
        let svc = TicketAuthLayer::new(Ticket::new("t0k")).layer(inner.clone());
        let mut req = request();
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic MTpr"));

        svc.oneshot(req).await.unwrap();

        assert_eq!(
            inner.values(),
            vec!["Basic MTpr".to_owned(), "Sourcegraph-Ticket t0k".to_owned()]
        );
    }

    #[tokio::test]
    async fn basic_outside_ticket_sends_both() {
        let inner = CaptureAuthorization::default();
        let svc = tower::ServiceBuilder::new()
            .layer(BasicAuthLayer::new(Credential::new(42, "secret")))
            .layer(TicketAuthLayer::new(Ticket::new("t0k")))
            .service(inner.clone());

        svc.oneshot(request()).await.unwrap();

        assert_eq!(
            inner.values(),
            vec![
                "Basic NDI6c2VjcmV0".to_owned(),
                "Sourcegraph-Ticket t0k".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn invalid_ticket_is_header_error() {
        let inner = CaptureAuthorization::default();
        let svc = TicketAuthLayer::new(Ticket::new("bad\nticket")).layer(inner.clone());

        let err = svc.oneshot(request()).await.unwrap_err();

        assert!(matches!(err, HttpError::HeaderValue(_)));
        assert!(inner.values().is_empty());
    }
}
