use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::types::Credential;

/// File name of the credential store inside the user's home directory.
pub const AUTH_FILE_NAME: &str = ".src-auth";

/// Source of stored per-endpoint credentials.
///
/// Keys are endpoint URLs in their serialized form
/// (`https://sourcegraph.com/api/`). Each call loads a fresh copy.
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// Load all stored credentials.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if the backing store exists but cannot be
    /// read or parsed.
    fn load(&self) -> Result<HashMap<String, Credential>, StoreError>;
}

/// JSON credential file, `$HOME/.src-auth` by default.
///
/// ```json
/// {"https://sourcegraph.com/api/": {"UID": 42, "Key": "..."}}
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$HOME/.src-auth`.
    ///
    /// # Errors
    /// Returns [`StoreError::NoHomeDir`] if the home directory is unknown.
    pub fn default_location() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        Ok(Self::new(home.join(AUTH_FILE_NAME)))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents with `credentials`.
    ///
    /// The file is written next to its final location and renamed into
    /// place; on Unix it is created with mode `0600`.
    ///
    /// # Errors
    /// Returns [`StoreError::Write`] on any I/O failure.
    pub fn save(&self, credentials: &HashMap<String, Credential>) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let data = serde_json::to_vec_pretty(credentials)
            .map_err(|e| write_err(io::Error::other(e)))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(format!(".{}.tmp", std::process::id()));
        let tmp = PathBuf::from(tmp_name);

        let written = write_private(&tmp, &data).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&tmp)
                && cleanup.kind() != io::ErrorKind::NotFound
            {
                tracing::debug!(path = %tmp.display(), error = %cleanup, "failed to remove temp credential file");
            }
            return Err(write_err(e));
        }

        tracing::debug!(path = %self.path.display(), entries = credentials.len(), "saved credential store");
        Ok(())
    }
}

fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<HashMap<String, Credential>, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::trace!(path = %self.path.display(), "no credential store file");
                return Ok(HashMap::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&raw).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Fixed in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    credentials: HashMap<String, Credential>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new(credentials: HashMap<String, Credential>) -> Self {
        Self { credentials }
    }

    /// Add a credential for `endpoint` (its serialized URL).
    #[must_use]
    pub fn with(mut self, endpoint: impl Into<String>, credential: Credential) -> Self {
        self.credentials.insert(endpoint.into(), credential);
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<HashMap<String, Credential>, StoreError> {
        Ok(self.credentials.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const ENDPOINT: &str = "https://sourcegraph.com/api/";

    #[test]
    fn missing_file_is_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(tmp.path().join(AUTH_FILE_NAME));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn loads_original_file_format() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(AUTH_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"https://sourcegraph.com/api/": {"UID": 7, "Key": "k"}}"#,
        )
        .unwrap();

        let creds = FileCredentialStore::new(&path).load().unwrap();
        assert_eq!(creds.get(ENDPOINT), Some(&Credential::new(7, "k")));
    }

    #[test]
    fn corrupt_file_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(AUTH_FILE_NAME);
        std::fs::write(&path, b"{not json").unwrap();

        let err = FileCredentialStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "got: {err:?}");
    }

    #[test]
    fn directory_in_place_of_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = FileCredentialStore::new(tmp.path()).load().unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }), "got: {err:?}");
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(tmp.path().join(AUTH_FILE_NAME));
        let creds = HashMap::from([(ENDPOINT.to_owned(), Credential::new(42, "secret"))]);

        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), creds);

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from(AUTH_FILE_NAME)]);
    }

    #[cfg(unix)]
    #[test]
    fn save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(tmp.path().join(AUTH_FILE_NAME));
        store.save(&HashMap::new()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(tmp.path().join("missing").join(AUTH_FILE_NAME));
        let err = store.save(&HashMap::new()).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }), "got: {err:?}");
    }

    #[test]
    fn memory_store_returns_contents() {
        let store = MemoryCredentialStore::default().with(ENDPOINT, Credential::new(1, "a"));
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
