use std::time::Duration;

/// `User-Agent` sent when the caller sets none.
pub const DEFAULT_USER_AGENT: &str = concat!("srclib-http/", env!("CARGO_PKG_VERSION"));

const MIB: usize = 1024 * 1024;

/// Where server certificates are anchored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrustRoots {
    /// Mozilla roots compiled into the binary
    #[default]
    Bundled,
    /// The operating system's certificate store
    System,
}

/// Which URL schemes the client will connect to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// `https://` only
    #[default]
    TlsOnly,
    /// `https://` and `http://`, e.g. for `http://localhost:3080/api/`
    AllowInsecureHttp,
}

/// Idle connection pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Close connections idle for longer than this; `None` keeps hyper's default
    pub idle_timeout: Option<Duration>,
    pub max_idle_per_host: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(90)),
            max_idle_per_host: 32,
        }
    }
}

/// Settings for the base transport shared by every srclib API client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-request deadline, including the time spent in the cache layer
    pub timeout: Duration,

    pub user_agent: String,

    /// Largest response body read into memory, in bytes
    ///
    /// The cache layer refuses to buffer anything bigger.
    pub max_body_size: usize,

    pub transport: TransportSecurity,

    pub trust_roots: TrustRoots,

    /// Requests that may wait for the client worker before `send()` fails
    /// with `HttpError::Overloaded`; 0 is treated as 1
    pub queue_depth: usize,

    pub pool: PoolConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: 10 * MIB,
            transport: TransportSecurity::TlsOnly,
            trust_roots: TrustRoots::Bundled,
            queue_depth: 1024,
            pool: PoolConfig::default(),
        }
    }
}

impl HttpClientConfig {
    /// Short timeout, 1 MiB bodies and plain HTTP, for local mock servers.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_body_size: MIB,
            transport: TransportSecurity::AllowInsecureHttp,
            queue_depth: 64,
            ..Self::default()
        }
    }
}
