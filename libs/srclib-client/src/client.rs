use srclib_auth::{Credential, resolve_credential, resolve_ticket};
use srclib_http::{HttpClient, RequestBuilder};
use url::{Position, Url};

use crate::config::ClientConfig;
use crate::endpoint::resolve_endpoint;
use crate::error::ClientError;
use crate::transport::compose_transport;

/// HTTP client bound to one API endpoint.
///
/// Cheap to clone; clones share the connection pool, cache and auth layers.
#[derive(Clone, Debug)]
pub struct ApiClient {
    endpoint: Url,
    http: HttpClient,
}

impl ApiClient {
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Resolve `path` against the endpoint.
    ///
    /// Paths are relative to the API root: `repos/x` under
    /// `https://sourcegraph.com/api/` is `https://sourcegraph.com/api/repos/x`.
    /// A leading `/` is dropped so the API prefix is kept.
    ///
    /// # Errors
    /// - [`ClientError::InvalidPath`] if the joined URL is invalid
    /// - [`ClientError::PathOutsideEndpoint`] if the result leaves the
    ///   endpoint, e.g. an absolute URL or `../` climbing above the API root
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let joined = self
            .endpoint
            .join(path.trim_start_matches('/'))
            .map_err(|source| ClientError::InvalidPath {
                path: path.to_owned(),
                source,
            })?;

        // Scheme, userinfo, host, port and directory of the endpoint.
        let base = &self.endpoint[..Position::AfterPath];
        let root = base.rfind('/').map_or(base, |i| &base[..=i]);
        if !joined.as_str().starts_with(root) {
            return Err(ClientError::PathOutsideEndpoint {
                path: path.to_owned(),
                endpoint: self.endpoint.to_string(),
            });
        }
        Ok(joined)
    }

    /// Start a GET request for an API path.
    ///
    /// # Errors
    /// Same as [`url`](Self::url).
    pub fn get(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.get(self.url(path)?.as_str()))
    }

    /// Start a POST request for an API path.
    ///
    /// # Errors
    /// Same as [`url`](Self::url).
    pub fn post(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.post(self.url(path)?.as_str()))
    }

    /// The underlying HTTP client, for requests outside the API root.
    ///
    /// Its auth layers decorate every request it sends, whatever the host.
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

/// Build a client for the configured endpoint using `credential`, if any.
///
/// The ticket is still taken from `SRCLIB_TICKET`.
///
/// # Errors
/// Returns [`ClientError`] if the endpoint is invalid or the transport
/// cannot be composed.
pub fn new_client(
    config: &ClientConfig,
    credential: Option<Credential>,
) -> Result<ApiClient, ClientError> {
    let endpoint = resolve_endpoint(&config.env)?;
    let ticket = resolve_ticket(&config.env);
    let http = compose_transport(config, &endpoint, ticket.as_ref(), credential.as_ref())?;
    Ok(ApiClient { endpoint, http })
}

/// Build a client, authenticating with `SRC_UID`/`SRC_KEY` or the stored
/// credential for the endpoint when one exists.
///
/// # Errors
/// Returns [`ClientError`] if the endpoint is invalid, `SRC_UID` is not an
/// integer, the credential store cannot be read, or the transport cannot be
/// composed.
pub fn new_client_with_stored_auth_if_present(
    config: &ClientConfig,
) -> Result<ApiClient, ClientError> {
    let endpoint = resolve_endpoint(&config.env)?;
    let credential = resolve_credential(&config.env, config.store.as_ref(), &endpoint)?;
    new_client(config, credential)
}
