use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration: facility backend, HTTP client tuning, response policy.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: Backend,
    pub http: HttpApiConfig,
    /// Dispatch even when some references failed to load.
    pub accept_partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// In-memory facility seeded from a YAML fixture.
    Memory { fixture: PathBuf },
    /// Facility-management REST API described by `EngineConfig::http`.
    Http,
}

#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    pub base_url: String,
    pub api_version: String,
    pub retry_max: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    pub auth: Option<AuthConfig>,
}

/// Client-credentials grant parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_version: "v1".to_string(),
            retry_max: 3,
            retry_backoff: Duration::from_millis(200),
            request_timeout: Duration::from_secs(30),
            auth: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Http,
            http: HttpApiConfig::default(),
            accept_partial: false,
        }
    }
}
