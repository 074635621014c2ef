use crate::cache::DiskCache;
use crate::client::{HttpClient, RequestQueue};
use crate::config::{HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::{CacheLayer, UserAgentLayer};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::buffer::Buffer;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// The stack an auth layer receives from [`HttpClientBuilder::with_auth_layer`].
pub type InnerService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

type AuthWrap = Box<dyn FnOnce(InnerService) -> InnerService + Send>;

/// Assembles an [`HttpClient`] from a config, an optional disk cache and
/// any number of auth layers.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    cache: Option<DiskCache>,
    auth_layers: Vec<AuthWrap>,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self {
            config,
            cache: None,
            auth_layers: Vec::new(),
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    /// Shorthand for `.transport(TransportSecurity::AllowInsecureHttp)`.
    ///
    /// Only in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "srclib_http::security",
            "plain HTTP allowed; requests and credentials may travel in cleartext"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Serve GET requests through a disk cache.
    ///
    /// The cache sits below every auth layer and so stores responses for
    /// the fully decorated request. Bodies over `max_body_size` are not
    /// buffered for caching.
    #[must_use]
    pub fn cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Add an auth layer above the cache.
    ///
    /// The first layer added sits closest to the cache; the last one sees
    /// each request first.
    #[must_use]
    pub fn with_auth_layer(
        mut self,
        wrap: impl FnOnce(InnerService) -> InnerService + Send + 'static,
    ) -> Self {
        self.auth_layers.push(Box::new(wrap));
        self
    }

    /// Compose the layer stack and spawn its queue worker.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// `HttpError::Tls` if the trust roots cannot be loaded, or
    /// `HttpError::HeaderValue` if the user agent is not a valid header value.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let HttpClientConfig {
            timeout,
            user_agent,
            max_body_size,
            transport,
            trust_roots,
            queue_depth,
            pool,
        } = self.config;

        let connector = tls::https_connector(trust_roots, transport)?;
        let mut hyper_builder = Client::builder(TokioExecutor::new());
        hyper_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(pool.max_idle_per_host);
        if let Some(idle) = pool.idle_timeout {
            hyper_builder.pool_idle_timeout(idle);
        }
        let hyper_client = hyper_builder.build::<_, Full<Bytes>>(connector);

        // Outer to inner: queue, auth layers (last added first), cache,
        // error mapping, timeout, user agent, decompression, hyper.
        let mut stack = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(UserAgentLayer::try_new(&user_agent)?)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(box_body)
            .map_err(move |e: tower::BoxError| from_stack_error(e, timeout))
            .boxed_clone();

        if let Some(cache) = self.cache {
            stack = ServiceBuilder::new()
                .layer(CacheLayer::new(cache, max_body_size))
                .service(stack)
                .boxed_clone();
        }
        for wrap in self.auth_layers {
            stack = wrap(stack);
        }

        // Buffer panics on a zero bound.
        let queue: RequestQueue = Buffer::new(stack, queue_depth.max(1));
        Ok(HttpClient {
            queue,
            max_body_size,
            transport,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed deadlines become `Timeout`; typed errors pass through; the rest is `Transport`.
fn from_stack_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }
    match err.downcast::<HttpError>() {
        Ok(err) => *err,
        Err(other) => HttpError::Transport(other),
    }
}

fn box_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    response.map(|body| body.map_err(Into::into).boxed())
}
