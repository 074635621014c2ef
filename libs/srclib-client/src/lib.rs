#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! srclib API client construction
//!
//! Resolves the API endpoint, the ticket and the user credential from an
//! [`EnvSnapshot`](srclib_auth::EnvSnapshot) and a credential store, then
//! composes a cached, authenticated [`HttpClient`](srclib_http::HttpClient).
//!
//! ```ignore
//! use srclib_client::{ClientConfig, new_client_with_stored_auth_if_present};
//!
//! let config = ClientConfig::from_process()?;
//! let api = new_client_with_stored_auth_if_present(&config)?;
//! let repos: Vec<Repo> = api.get("repos")?.send().await?.json().await?;
//! ```

mod client;
mod config;
mod endpoint;
mod error;
mod transport;

pub use client::{ApiClient, new_client, new_client_with_stored_auth_if_present};
pub use config::{CACHE_DIR_NAME, CacheFailurePolicy, ClientConfig, default_cache_dir};
pub use endpoint::{DEFAULT_ENDPOINT, resolve_endpoint};
pub use error::ClientError;
pub use transport::compose_transport;
