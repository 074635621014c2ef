//! Disk-backed HTTP response cache.
//!
//! [`DiskCache`] persists one JSON entry per request URI under a cache
//! directory; the `policy` module decides freshness, revalidation and storability
//! following the private-cache subset of RFC 7234. The tower side lives in
//! [`CacheLayer`](crate::CacheLayer).

pub(crate) mod policy;
mod store;

pub use store::{CachedResponse, DiskCache};

use http::HeaderName;

/// Header set on every response replayed from the cache.
pub const X_FROM_CACHE: HeaderName = HeaderName::from_static("x-from-cache");
