#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Credential handling for srclib API clients
//!
//! - [`EnvSnapshot`] captures the process environment once so resolution is
//!   reproducible in tests.
//! - [`CredentialStore`] loads per-endpoint credentials; [`FileCredentialStore`]
//!   reads `$HOME/.src-auth`.
//! - [`resolve_credential`] and [`resolve_ticket`] apply the precedence rules
//!   (`SRC_UID`/`SRC_KEY` over the store, `SRCLIB_TICKET` for tickets).
//! - [`TicketAuthLayer`] and [`BasicAuthLayer`] put the results on the wire;
//!   [`HttpClientBuilderExt`] plugs them into [`srclib_http::HttpClientBuilder`].

pub mod builder_ext;
pub mod env;
pub mod error;
pub mod layer;
pub mod resolve;
pub mod store;
pub mod types;

pub use builder_ext::HttpClientBuilderExt;
pub use env::EnvSnapshot;
pub use error::{CredentialError, StoreError};
pub use layer::{AuthService, BasicAuthLayer, TicketAuthLayer};
pub use resolve::{resolve_credential, resolve_ticket};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{Credential, SecretString, Ticket};
