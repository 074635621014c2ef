use crate::cache::policy::{self, Freshness};
use crate::cache::{CachedResponse, DiskCache};
use crate::error::HttpError;
use crate::response::{ResponseBody, read_body_limited};
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;
use tower::{Layer, Service};

/// Tower layer that answers GET requests from a [`DiskCache`].
///
/// Fresh entries are replayed without calling the inner service, stale
/// entries are revalidated with `If-None-Match` / `If-Modified-Since`, and
/// storable responses are buffered (up to `max_body_size`) and written
/// back. Every replayed response carries `X-From-Cache: 1`.
#[derive(Clone, Debug)]
pub struct CacheLayer {
    cache: DiskCache,
    max_body_size: usize,
}

impl CacheLayer {
    #[must_use]
    pub fn new(cache: DiskCache, max_body_size: usize) -> Self {
        Self {
            cache,
            max_body_size,
        }
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = CacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner,
            cache: self.cache.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

/// Service created by [`CacheLayer`]
#[derive(Clone, Debug)]
pub struct CacheService<S> {
    inner: S,
    cache: DiskCache,
    max_body_size: usize,
}

impl<S> Service<Request<Full<Bytes>>> for CacheService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = Response<ResponseBody>;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Clone-swap: consume the instance that was poll_ready'd.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let cache = self.cache.clone();
        let max_body_size = self.max_body_size;

        Box::pin(async move {
            if policy::is_cacheable_request(req.method(), req.headers()) {
                cached_round_trip(inner, cache, max_body_size, req).await
            } else {
                passthrough(inner, cache, req).await
            }
        })
    }
}

fn replay(entry: &CachedResponse) -> Option<Response<ResponseBody>> {
    match entry.to_response() {
        Ok(response) => Some(response),
        Err(e) => {
            tracing::debug!(error = %e, "cache entry cannot be replayed");
            None
        }
    }
}

async fn store(cache: &DiskCache, key: &str, entry: &CachedResponse) {
    if let Err(e) = cache.put(key, entry).await {
        tracing::warn!(key, error = %e, "failed to write HTTP cache entry");
    }
}

async fn forget(cache: &DiskCache, key: &str) {
    if let Err(e) = cache.remove(key).await {
        tracing::warn!(key, error = %e, "failed to remove HTTP cache entry");
    }
}

/// Non-GET requests go straight through; a successful unsafe method drops
/// the stored GET entry for the same URI.
async fn passthrough<S>(
    mut inner: S,
    cache: DiskCache,
    req: Request<Full<Bytes>>,
) -> Result<Response<ResponseBody>, HttpError>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>,
{
    let invalidate = policy::invalidates_entry(req.method()).then(|| req.uri().to_string());
    let response = inner.call(req).await?;
    if let Some(key) = invalidate
        && (response.status().is_success() || response.status().is_redirection())
    {
        forget(&cache, &key).await;
    }
    Ok(response)
}

async fn cached_round_trip<S>(
    mut inner: S,
    cache: DiskCache,
    max_body_size: usize,
    mut req: Request<Full<Bytes>>,
) -> Result<Response<ResponseBody>, HttpError>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>,
{
    let key = req.uri().to_string();
    let now = SystemTime::now();

    let cached = cache
        .get(&key)
        .await
        .filter(|entry| policy::vary_matches(req.headers(), entry));

    match &cached {
        Some(entry) => match policy::freshness(req.headers(), entry, now) {
            Freshness::Fresh => {
                if let Some(response) = replay(entry) {
                    tracing::trace!(key = %key, "HTTP cache hit");
                    return Ok(response);
                }
            }
            Freshness::Stale => policy::add_validators(req.headers_mut(), entry),
            Freshness::Transparent => {}
        },
        None if policy::CacheControl::parse(req.headers()).has("only-if-cached") => {
            let mut response = Response::new(empty_body());
            *response.status_mut() = StatusCode::GATEWAY_TIMEOUT;
            *response.headers_mut() = policy::gateway_timeout_headers();
            return Ok(response);
        }
        None => {}
    }

    let request_headers = req.headers().clone();
    let result = inner.call(req).await;

    if let Some(entry) = cached {
        let failed = match &result {
            Ok(response) => response.status().is_server_error(),
            Err(_) => true,
        };
        if failed
            && policy::can_serve_stale_on_error(&request_headers, &entry, now)
            && let Some(response) = replay(&entry)
        {
            tracing::debug!(key = %key, "origin failed; serving stale cache entry");
            return Ok(response);
        }

        if let Ok(response) = &result
            && response.status() == StatusCode::NOT_MODIFIED
        {
            let mut entry = entry;
            entry.merge_revalidation(response.headers(), SystemTime::now());
            store(&cache, &key, &entry).await;
            if let Some(response) = replay(&entry) {
                return Ok(response);
            }
        }
    }

    let response = result?;
    let vary = policy::vary_snapshot(&request_headers, response.headers());
    let Some(vary) = vary.filter(|_| {
        policy::is_storable(&request_headers, response.status(), response.headers())
    }) else {
        forget(&cache, &key).await;
        return Ok(response);
    };

    let (parts, body) = response.into_parts();
    let body = read_body_limited(Response::new(body), max_body_size).await?;

    let entry = CachedResponse::new(parts.status, &parts.headers, body.clone(), vary, now);
    store(&cache, &key, &entry).await;

    Ok(Response::from_parts(parts, full_body(body)))
}

fn full_body(body: Bytes) -> ResponseBody {
    Full::new(body)
        .map_err(|never: Infallible| match never {})
        .boxed()
}

fn empty_body() -> ResponseBody {
    full_body(Bytes::new())
}
