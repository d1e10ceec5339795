use crate::client::Config;
use crate::error::{RestError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tokio::sync::Mutex;

const TOKEN_PATH: &str = "oauth/access_token";

/// Token is an OAuth2 bearer token together with its expiration instant.
#[derive(Debug, Clone)]
pub struct Token {
    /// Access token sent as `Authorization: Bearer ...`
    pub access_token: String,
    /// Instant the server declared the token to expire
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token issued at `issued_at` that lives `expires_in` seconds
    pub fn new(access_token: String, issued_at: DateTime<Utc>, expires_in: i64) -> Self {
        let lifetime = Duration::seconds(expires_in.clamp(0, i64::MAX / 1000));
        Token {
            access_token,
            expires_at: issued_at
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Valid strictly before the expiration instant
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Body returned by the token endpoint, success or failure.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default, deserialize_with = "seconds")]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// PowerSchool sends `expires_in` as a string; accept numbers too.
fn seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid expires_in: {:?}", s))),
    }
}

/// Obtains and caches the client-credentials token.
///
/// Refresh happens under the lock: callers that find the token expired while
/// another refresh is in flight wait for it and reuse its result.
pub struct TokenManager {
    http: Client,
    token_url: String,
    basic_auth: String,
    state: Mutex<Option<Token>>,
}

impl TokenManager {
    /// Create a manager for the server and credentials in `config`
    pub fn new(http: Client, config: &Config) -> Self {
        let credentials = STANDARD.encode(format!("{}:{}", config.client_id, config.client_secret));
        TokenManager {
            http,
            token_url: format!("{}{}", config.base_url(), TOKEN_PATH),
            basic_auth: format!("Basic {}", credentials),
            state: Mutex::new(None),
        }
    }

    /// True when no token has been obtained yet or the current one has expired
    pub async fn is_expired(&self) -> bool {
        match self.state.lock().await.as_ref() {
            Some(token) => !token.is_valid_at(Utc::now()),
            None => true,
        }
    }

    /// Return a valid access token, exchanging credentials first if needed
    pub async fn valid_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let Some(token) = state.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        *state = None;
        let token = self.request_token().await.map_err(|e| {
            tracing::error!(error = %e, "failed to obtain access token");
            e
        })?;
        let access_token = token.access_token.clone();
        *state = Some(token);

        Ok(access_token)
    }

    /// Drop the cached token so the next call authenticates again
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    async fn request_token(&self) -> Result<Token> {
        let issued_at = Utc::now();

        let response = self
            .http
            .post(&self.token_url)
            .header(AUTHORIZATION, &self.basic_auth)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
            .header(ACCEPT, "application/json")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| RestError::Auth(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RestError::Auth(format!("token response unreadable: {}", e)))?;

        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            RestError::Auth(format!(
                "token endpoint returned {}: {} ({})",
                status,
                String::from_utf8_lossy(&body),
                e
            ))
        })?;

        if let Some(error) = parsed.error {
            return Err(RestError::Auth(match parsed.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            }));
        }

        if !status.is_success() {
            return Err(RestError::Auth(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let (access_token, expires_in) = match (parsed.access_token, parsed.expires_in) {
            (Some(token), Some(expires_in)) if !token.is_empty() => (token, expires_in),
            _ => {
                return Err(RestError::Auth(
                    "token response lacks access_token or expires_in".to_string(),
                ))
            }
        };

        let token = Token::new(access_token, issued_at, expires_in);
        tracing::info!(expires_at = %token.expires_at, "obtained access token");

        Ok(token)
    }
}
