use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::{HttpResponse, ResponseBody};
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use std::task::Poll;
use tower::Service;
use tower::buffer::Buffer;

/// Future produced by the type-erased layer stack.
pub type StackFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Request queue in front of the layer stack; clones share one worker task.
pub type RequestQueue = Buffer<Request<Full<Bytes>>, StackFuture>;

/// Handle to a composed srclib transport.
///
/// Built with [`HttpClientBuilder`]. Cloning is cheap: clones share the
/// connection pool, the disk cache and the auth layers.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) queue: RequestQueue,
    pub(crate) max_body_size: usize,
    pub(crate) transport: TransportSecurity,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_body_size", &self.max_body_size)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Start a GET request. `url` must be absolute.
    pub fn get(&self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Method::GET, url)
    }

    /// Start a POST request. `url` must be absolute.
    pub fn post(&self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), Method::POST, url)
    }

    /// Queue `request` and wait for the layer stack to answer it.
    pub(crate) async fn execute(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<HttpResponse, HttpError> {
        let mut queue = self.queue.clone();
        reserve_slot(&mut queue).await?;
        let inner = queue.call(request).await.map_err(from_queue_error)?;
        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}

/// Take a queue slot if one is free right now; a full queue is `Overloaded`.
async fn reserve_slot(queue: &mut RequestQueue) -> Result<(), HttpError> {
    let ready = std::future::poll_fn(|cx| match queue.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match ready {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(from_queue_error(e)),
        None => Err(HttpError::Overloaded),
    }
}

/// Stack errors come back boxed by the queue; anything else means its worker is gone.
fn from_queue_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(err) => *err,
        Err(err) => {
            tracing::error!(error = %err, "HTTP client worker stopped");
            HttpError::ServiceClosed
        }
    }
}
