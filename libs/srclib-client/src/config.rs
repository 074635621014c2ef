use std::path::PathBuf;
use std::sync::Arc;

use srclib_auth::{CredentialStore, EnvSnapshot, FileCredentialStore, MemoryCredentialStore, StoreError};
use srclib_http::HttpClientConfig;

/// Directory name of the shared HTTP cache under the system temp directory.
pub const CACHE_DIR_NAME: &str = "srclib-cache";

/// What to do when the cache directory cannot be opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum CacheFailurePolicy {
    /// Log a warning and build the client without the cache layer
    #[default]
    Bypass,
    /// Fail client construction with `ClientError::CacheUnavailable`
    Fail,
}

/// Everything the client factory reads.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Environment captured at start-up
    pub env: EnvSnapshot,

    /// Stored per-endpoint credentials
    pub store: Arc<dyn CredentialStore>,

    /// HTTP cache directory (default: `<temp dir>/srclib-cache`)
    pub cache_dir: PathBuf,

    pub cache_failure: CacheFailurePolicy,

    /// Base HTTP client settings
    pub http: HttpClientConfig,
}

impl ClientConfig {
    /// Config for the running process: live environment and `$HOME/.src-auth`.
    ///
    /// # Errors
    /// Returns [`StoreError::NoHomeDir`] if the home directory is unknown.
    pub fn from_process() -> Result<Self, StoreError> {
        Ok(Self::new(
            EnvSnapshot::from_process(),
            Arc::new(FileCredentialStore::default_location()?),
        ))
    }

    #[must_use]
    pub fn new(env: EnvSnapshot, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            env,
            store,
            cache_dir: default_cache_dir(),
            cache_failure: CacheFailurePolicy::default(),
            http: HttpClientConfig::default(),
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: EnvSnapshot) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_cache_failure(mut self, policy: CacheFailurePolicy) -> Self {
        self.cache_failure = policy;
        self
    }

    #[must_use]
    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }
}

impl Default for ClientConfig {
    /// Empty environment and an empty in-memory store.
    fn default() -> Self {
        Self::new(
            EnvSnapshot::default(),
            Arc::new(MemoryCredentialStore::default()),
        )
    }
}

/// `<temp dir>/srclib-cache`
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(CACHE_DIR_NAME)
}
