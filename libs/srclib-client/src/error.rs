use std::path::PathBuf;

use srclib_auth::CredentialError;
use srclib_http::HttpError;
use thiserror::Error;

/// Errors from building an API client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// `SRC_ENDPOINT` is not a valid absolute URL.
    #[error("parsing SRC_ENDPOINT URL string: {source}")]
    InvalidEndpoint {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The cache directory could not be created and the policy is
    /// [`CacheFailurePolicy::Fail`](crate::CacheFailurePolicy::Fail).
    #[error("opening HTTP cache at {}: {source}", path.display())]
    CacheUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("building HTTP transport: {0}")]
    Transport(#[from] HttpError),

    #[error("joining API path {path}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },

    /// The path resolved to another origin or above the API root.
    #[error("API path {path} resolves outside {endpoint}")]
    PathOutsideEndpoint { path: String, endpoint: String },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn invalid_endpoint_renders() {
        let source = url::Url::parse("not a url").unwrap_err();
        let e = ClientError::InvalidEndpoint {
            value: "not a url".into(),
            source,
        };
        assert_eq!(
            e.to_string(),
            "parsing SRC_ENDPOINT URL string: relative URL without a base"
        );
    }

    #[test]
    fn credential_error_is_transparent() {
        let source = "x".parse::<i64>().unwrap_err();
        let e = ClientError::from(CredentialError::InvalidUid {
            value: "x".into(),
            source,
        });
        assert_eq!(e.to_string(), "parsing SRC_UID: invalid digit found in string");
    }

    #[test]
    fn cache_unavailable_renders_path() {
        let e = ClientError::CacheUnavailable {
            path: PathBuf::from("/tmp/srclib-cache"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(
            e.to_string(),
            "opening HTTP cache at /tmp/srclib-cache: permission denied"
        );
    }

    #[test]
    fn path_outside_endpoint_renders() {
        let e = ClientError::PathOutsideEndpoint {
            path: "../admin".into(),
            endpoint: "https://sourcegraph.com/api/".into(),
        };
        assert_eq!(
            e.to_string(),
            "API path ../admin resolves outside https://sourcegraph.com/api/"
        );
    }
}
