use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or saving the credential store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot determine home directory for the credential store")]
    NoHomeDir,
}

/// Errors from [`resolve_credential`](crate::resolve_credential).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// `SRC_UID` was set but is not an integer.
    #[error("parsing SRC_UID: {source}")]
    InvalidUid {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("reading user auth: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn invalid_uid_renders() {
        let source = "abc".parse::<i64>().unwrap_err();
        let e = CredentialError::InvalidUid {
            value: "abc".into(),
            source,
        };
        assert_eq!(e.to_string(), "parsing SRC_UID: invalid digit found in string");
    }

    #[test]
    fn store_error_renders_with_prefix() {
        let e = CredentialError::from(StoreError::Read {
            path: PathBuf::from("/home/u/.src-auth"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert_eq!(
            e.to_string(),
            "reading user auth: reading /home/u/.src-auth: permission denied"
        );
    }

    #[test]
    fn no_home_dir_renders() {
        assert_eq!(
            StoreError::NoHomeDir.to_string(),
            "cannot determine home directory for the credential store"
        );
    }
}
