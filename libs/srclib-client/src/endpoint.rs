use srclib_auth::EnvSnapshot;
use srclib_auth::env::SRC_ENDPOINT;
use url::Url;

use crate::error::ClientError;

/// API endpoint used when `SRC_ENDPOINT` is not set.
pub const DEFAULT_ENDPOINT: &str = "https://sourcegraph.com/api/";

/// The API endpoint: `SRC_ENDPOINT` if set, otherwise [`DEFAULT_ENDPOINT`].
///
/// # Errors
/// Returns [`ClientError::InvalidEndpoint`] if `SRC_ENDPOINT` does not parse
/// as an absolute URL. There is no fallback to the default in that case.
pub fn resolve_endpoint(env: &EnvSnapshot) -> Result<Url, ClientError> {
    let Some(value) = env.get(SRC_ENDPOINT) else {
        return Url::parse(DEFAULT_ENDPOINT).map_err(|source| ClientError::InvalidEndpoint {
            value: DEFAULT_ENDPOINT.to_owned(),
            source,
        });
    };

    Url::parse(value).map_err(|source| ClientError::InvalidEndpoint {
        value: value.to_owned(),
        source,
    })
}
