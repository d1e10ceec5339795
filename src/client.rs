use crate::error::{RestError, Result};
use reqwest::{Client, ClientBuilder};
use std::fmt;
use std::time::Duration;

/// Environment variable holding the PowerSchool server URL
pub const ENV_URL: &str = "POWERSCHOOL_URL";
/// Environment variable holding the plugin client ID
pub const ENV_CLIENT_ID: &str = "POWERSCHOOL_CLIENT_ID";
/// Environment variable holding the plugin client secret
pub const ENV_CLIENT_SECRET: &str = "POWERSCHOOL_CLIENT_SECRET";
/// Optional environment variable overriding the page size
pub const ENV_PAGE_SIZE: &str = "POWERSCHOOL_PAGE_SIZE";

/// Create the HTTP client used for every request, with the configured timeouts
pub fn create_http_client(config: &Config) -> Result<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(50)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(RestError::from)
}

/// Configuration for the PowerSchool client.
///
/// The client ID and secret come from the Data Provider Configuration page
/// of a data access plugin installed on the server.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the PowerSchool server
    pub base_url: String,
    /// Plugin client ID
    pub client_id: String,
    /// Plugin client secret
    pub client_secret: String,
    /// Overall timeout for one HTTP request
    pub timeout: Duration,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Records per page requested from collection endpoints; server default when `None`
    pub page_size: Option<u32>,
    /// Upper bound on pages fetched by one paging loop
    pub max_pages: u32,
}

impl Config {
    /// Create a new configuration for the given server and credentials
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Config {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            page_size: None,
            max_pages: 10_000,
        }
    }

    /// Load the configuration from `POWERSCHOOL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::new(
            require_env(ENV_URL)?,
            require_env(ENV_CLIENT_ID)?,
            require_env(ENV_CLIENT_SECRET)?,
        );

        if let Ok(raw) = std::env::var(ENV_PAGE_SIZE) {
            let size = raw.trim().parse::<u32>().map_err(|_| {
                RestError::Config(format!(
                    "{} must be a positive integer, got {:?}",
                    ENV_PAGE_SIZE, raw
                ))
            })?;
            config = config.with_page_size(size);
        }

        Ok(config)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Request pages of `size` records
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size).filter(|s| *s > 0);
        self
    }

    /// Set the maximum number of pages one paging loop may request
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Get the base URL with a trailing slash, ready for joining relative paths
    pub fn base_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(RestError::Config(format!("{} is not set", name))),
    }
}
