//! Tower layers composed by [`HttpClientBuilder`](crate::HttpClientBuilder)
//!
//! - [`UserAgentLayer`] - default `User-Agent` header
//! - [`CacheLayer`] - disk-backed response cache for GET requests

mod cache;
mod user_agent;

pub use cache::{CacheLayer, CacheService};
pub use user_agent::{UserAgentLayer, UserAgentService};
