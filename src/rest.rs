use crate::client::{create_http_client, Config};
use crate::error::{RestError, Result};
use crate::response::{self, Envelope, InsertResponse, ResourceId};
use crate::token::TokenManager;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Instant;
use url::Url;

/// Query parameters shared by item and collection requests.
///
/// Each field is sent only when set to a non-empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Comma-delimited list of elements to expand
    pub expansions: Option<String>,
    /// Comma-delimited list of 1:1 extensions to include
    pub extensions: Option<String>,
    /// Criteria selecting a subset of records (`q`)
    pub query: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expansions(mut self, expansions: impl Into<String>) -> Self {
        self.expansions = Some(expansions.into());
        self
    }

    pub fn extensions(mut self, extensions: impl Into<String>) -> Self {
        self.extensions = Some(extensions.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Build the query string pairs, omitting absent and empty values
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        [
            ("expansions", &self.expansions),
            ("extensions", &self.extensions),
            ("q", &self.query),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value.as_deref() {
            Some(v) if !v.is_empty() => Some((key, v.to_string())),
            _ => None,
        })
        .collect()
    }
}

/// Client for one PowerSchool server.
///
/// Construct it once and share it by reference (or behind an `Arc`); every
/// method takes `&self`. The only mutable state is the cached access token.
pub struct PowerSchool {
    pub(crate) http: Client,
    pub(crate) config: Config,
    pub(crate) base: Url,
    pub(crate) tokens: TokenManager,
}

impl PowerSchool {
    /// Create a client with its own HTTP connection pool
    pub fn new(config: Config) -> Result<Self> {
        let http = create_http_client(&config)?;
        Self::with_http_client(config, http)
    }

    /// Create a client from `POWERSCHOOL_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// Create a client that sends requests through an existing `reqwest::Client`
    pub fn with_http_client(config: Config, http: Client) -> Result<Self> {
        let base = Url::parse(&config.base_url())?;
        let tokens = TokenManager::new(http.clone(), &config);

        Ok(PowerSchool {
            http,
            config,
            base,
            tokens,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True when the next request has to obtain a new access token first
    pub async fn is_token_expired(&self) -> bool {
        self.tokens.is_expired().await
    }

    /// Return a valid access token, obtaining one if needed
    pub async fn access_token(&self) -> Result<String> {
        self.tokens.valid_token().await
    }

    /// Fetch a single record and return the whole response body
    ///
    /// # Arguments
    /// * `path` - Endpoint path relative to the server, e.g. `ws/v1/student/12`
    /// * `options` - Expansions, extensions and query to send
    pub async fn get_item(&self, path: &str, options: &QueryOptions) -> Result<Value> {
        let url = self.url(path)?;
        self.request_json(Method::GET, url, &options.to_params(), None)
            .await
    }

    /// Fetch server metadata (`ws/v1/metadata`)
    pub async fn metadata(&self) -> Result<Value> {
        let url = self.url("ws/v1/metadata")?;
        let body = self.request_json(Method::GET, url, &[], None).await?;
        response::unwrap_single(body, "metadata")
            .inspect_err(|e| tracing::error!(error = %e, "unexpected metadata response"))
    }

    /// Get the number of records available at a collection endpoint
    ///
    /// # Arguments
    /// * `resource_url` - Collection endpoint, relative or absolute; `/count` is appended
    /// * `options` - Same parameters the collection will be fetched with
    pub async fn resource_count(&self, resource_url: &str, options: &QueryOptions) -> Result<u64> {
        let url = self.url(resource_url)?;
        self.count_at(&url, &options.to_params()).await
    }

    /// Create a new record
    ///
    /// Returns the id of the new record when the server reports exactly one
    /// successful insert, and `None` for any other response. A 401 or 403 is
    /// an error, not a missing id.
    pub async fn post_item<B>(&self, path: &str, body: &B) -> Result<Option<ResourceId>>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let body = serde_json::to_value(body)?;

        let (status, bytes) = self
            .exchange(Method::POST, &url, &[], Some(&body))
            .await
            .inspect_err(|e| {
                tracing::error!(path = url.path(), error = %e, "insert request failed")
            })?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let error = status_error(status, &bytes);
            tracing::error!(path = url.path(), error = %error, "insert was not authorized");
            return Err(error);
        }

        let value: Value = serde_json::from_slice(&bytes).inspect_err(|e| {
            tracing::error!(path = url.path(), error = %e, "insert response is not JSON")
        })?;

        let id = serde_json::from_value::<InsertResponse>(value.clone())
            .ok()
            .and_then(|r| r.created_id());

        if id.is_none() {
            tracing::warn!(
                path = url.path(),
                status = status.as_u16(),
                response = %value,
                "record was not created"
            );
        }

        Ok(id)
    }

    /// Fetch every record of a paged collection
    ///
    /// The record count is requested first; pages are then fetched in order
    /// until that many records have been collected. Any failure discards the
    /// records gathered so far.
    ///
    /// # Arguments
    /// * `path` - Collection endpoint; its last segment names the envelope keys
    /// * `options` - Expansions, extensions and query to send with every page
    pub async fn fetch_all(&self, path: &str, options: &QueryOptions) -> Result<Vec<Value>> {
        let envelope = Envelope::for_endpoint(path);
        let url = self.url(path)?;
        let params = options.to_params();

        let total = self.count_at(&url, &params).await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let (url, params, envelope) = (&url, &params, &envelope);
        self.paginate(total, |page| async move {
            let query = self.page_params(params, page);
            let body = self
                .request_json(Method::GET, url.clone(), &query, None)
                .await?;
            envelope
                .unwrap_page(body)
                .inspect_err(|e| tracing::error!(page, error = %e, "unexpected page response"))
        })
        .await
    }

    /// Run a sequential page loop until `expected` records are collected.
    ///
    /// Pages start at 1 and advance after every successful fetch. A page with
    /// no records, or running past `max_pages`, stops the loop with an error.
    pub(crate) async fn paginate<F, Fut>(
        &self,
        expected: u64,
        mut fetch_page: F,
    ) -> Result<Vec<Value>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        let mut records: Vec<Value> = Vec::new();
        if expected == 0 {
            return Ok(records);
        }

        for page in 1..=self.config.max_pages {
            let batch = fetch_page(page).await?;
            if batch.is_empty() {
                return Err(self.stalled(page, records.len(), expected));
            }

            tracing::debug!(page, received = batch.len(), expected, "fetched page");
            records.extend(batch);

            if records.len() as u64 >= expected {
                return Ok(records);
            }
        }

        let page = self.config.max_pages.saturating_add(1);
        Err(self.stalled(page, records.len(), expected))
    }

    fn stalled(&self, page: u32, received: usize, expected: u64) -> RestError {
        let error = RestError::PaginationStalled {
            page,
            received,
            expected,
        };
        tracing::error!(error = %error, "aborting pagination");
        error
    }

    /// Query pairs for one page: the base parameters, `page` and `pagesize`
    pub(crate) fn page_params(
        &self,
        params: &[(&'static str, String)],
        page: u32,
    ) -> Vec<(&'static str, String)> {
        let mut query = params.to_vec();
        query.push(("page", page.to_string()));
        if let Some(size) = self.config.page_size {
            query.push(("pagesize", size.to_string()));
        }
        query
    }

    /// Resolve an endpoint against the server base URL
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    /// Append `/count` to a resource URL, keeping any query it already carries
    pub(crate) fn count_url(url: &Url) -> Url {
        let mut count = url.clone();
        count.set_path(&format!("{}/count", url.path().trim_end_matches('/')));
        count
    }

    async fn count_at(&self, url: &Url, params: &[(&'static str, String)]) -> Result<u64> {
        let count_url = Self::count_url(url);
        let body = self
            .request_json(Method::GET, count_url, params, None)
            .await?;
        response::resource_count(&body).inspect_err(|e| {
            tracing::error!(path = url.path(), error = %e, "unexpected count response")
        })
    }

    /// Send an authenticated request and decode the JSON response.
    ///
    /// Non-success statuses become `Api`/`Validation` errors when the body
    /// carries a server message and `Http` errors otherwise. A 401 drops the
    /// cached token so the next call authenticates again.
    pub(crate) async fn request_json(
        &self,
        method: Method,
        url: Url,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let path = url.path().to_string();
        self.send(method.clone(), url, query, body)
            .await
            .inspect_err(|e| tracing::error!(%method, path = %path, error = %e, "request failed"))
    }

    /// Like [`request_json`](Self::request_json) without the failure log, for
    /// callers that report failures themselves.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let (status, bytes) = self.exchange(method, &url, query, body).await?;

        if !status.is_success() {
            return Err(status_error(status, &bytes));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Perform one authenticated request and return its status and raw body
    async fn exchange(
        &self,
        method: Method,
        url: &Url,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let token = self.tokens.valid_token().await?;

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?.to_vec();

        tracing::debug!(
            %method,
            path = url.path(),
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "request completed"
        );

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }

        Ok((status, bytes))
    }
}

/// Error for a non-success response: the server message when there is one,
/// the raw status and body otherwise
fn status_error(status: StatusCode, bytes: &[u8]) -> RestError {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|body| RestError::from_body(Some(status.as_u16()), &body))
        .unwrap_or_else(|| RestError::Http {
            status: status.as_u16(),
            body: String::from_utf8_lossy(bytes).to_string(),
        })
}
