#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport shared by the srclib API clients.
//!
//! [`HttpClientBuilder`] composes a tower stack over hyper: HTTPS through
//! rustls, pooled connections, a whole-request timeout, a default
//! `User-Agent`, transparent decompression, an optional RFC 7234 disk
//! cache ([`DiskCache`], [`CacheLayer`]) and caller-supplied auth layers.
//! Plain `http://` is refused unless [`TransportSecurity::AllowInsecureHttp`]
//! is chosen.
//!
//! # Layer order
//!
//! Auth layers added through [`HttpClientBuilder::with_auth_layer`] stack
//! outward in the order they are added: the first one sits directly above
//! the cache, the last one is the outermost layer and sees each request first.
//! The cache therefore always observes the fully decorated request and only
//! the cache talks to the network.
//!
//! # Example
//!
//! ```ignore
//! use srclib_http::{DiskCache, HttpClient};
//!
//! let cache = DiskCache::open(std::env::temp_dir().join("srclib-cache"))?;
//! let client = HttpClient::builder()
//!     .user_agent("src/0.1")
//!     .cache(cache)
//!     .build()?;
//!
//! let repos: serde_json::Value = client
//!     .get("https://sourcegraph.com/api/repos")
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
pub mod cache;
mod client;
mod config;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::{HttpClientBuilder, InnerService};
pub use cache::{CachedResponse, DiskCache, X_FROM_CACHE};
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, PoolConfig, TransportSecurity, TrustRoots};
pub use error::{HttpError, UrlRejection};
pub use layers::{CacheLayer, CacheService, UserAgentLayer, UserAgentService};
pub use request::RequestBuilder;
pub use response::{HttpResponse, ResponseBody};
