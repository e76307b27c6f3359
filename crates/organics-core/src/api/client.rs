//! API client for communicating with the organics backend.
//!
//! This module provides the `ApiClient` struct for the operator login
//! exchange and the connected-accounts resource.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::config::Config;
use crate::models::ConnectedAccount;

use super::{AccountsApi, ApiError, AuthApi};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Number of accounts requested per listing.
const DEFAULT_ACCOUNT_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// API client for the organics backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    account_limit: usize,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Create a new API client with an explicit request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            account_limit: DEFAULT_ACCOUNT_LIMIT,
        })
    }

    /// Build a client from the application configuration
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Ok(Self::with_timeout(&config.api_base_url, config.request_timeout())?
            .with_account_limit(config.account_limit))
    }

    /// Override how many accounts a listing asks for
    pub fn with_account_limit(mut self, limit: usize) -> Self {
        self.account_limit = limit.max(1);
        self
    }

    /// Join path segments onto the base URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Exchange operator credentials for a bearer token.
    ///
    /// Credentials travel as form fields (`username`, `password`).
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Credential, ApiError> {
        let url = self.endpoint(&["auth", "login"])?;

        let response = self
            .client
            .post(url)
            .form(&[("username", identifier), ("password", secret)])
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse token response: {}", e)))?;

        if token.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Token response did not contain an access token".to_string(),
            ));
        }

        Ok(Credential::new(token.access_token, token.token_type))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        credential: &Credential,
    ) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(credential.access_token())
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url.path(), e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url.path(), retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Connected Accounts =====

    /// Fetch the connected accounts, most recently refreshed first
    pub async fn fetch_accounts(&self, credential: &Credential) -> Result<Vec<ConnectedAccount>, ApiError> {
        let mut url = self.endpoint(&["accounts"])?;
        url.query_pairs_mut()
            .append_pair("limit", &self.account_limit.to_string());

        let accounts: Vec<ConnectedAccount> = self.get(url, credential).await?;
        debug!(count = accounts.len(), "Fetched connected accounts");
        Ok(accounts)
    }

    /// Delete a connected account by id
    pub async fn delete_account(&self, credential: &Credential, account_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["accounts", account_id])?;

        let response = self
            .client
            .delete(url)
            .bearer_auth(credential.access_token())
            .send()
            .await?;

        Self::check_response(response).await?;
        debug!(account_id = account_id, "Deleted connected account");
        Ok(())
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<Credential, ApiError> {
        self.login(identifier, secret).await
    }
}

#[async_trait]
impl AccountsApi for ApiClient {
    async fn list_accounts(&self, credential: &Credential) -> Result<Vec<ConnectedAccount>, ApiError> {
        self.fetch_accounts(credential).await
    }

    async fn delete_account(&self, credential: &Credential, account_id: &str) -> Result<(), ApiError> {
        ApiClient::delete_account(self, credential, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_segments() {
        let client = ApiClient::new("https://api.example.com").expect("valid base url");
        assert_eq!(
            client.endpoint(&["auth", "login"]).expect("endpoint").as_str(),
            "https://api.example.com/auth/login"
        );

        let nested = ApiClient::new("https://api.example.com/v1/").expect("valid base url");
        assert_eq!(
            nested.endpoint(&["accounts"]).expect("endpoint").as_str(),
            "https://api.example.com/v1/accounts"
        );
    }

    #[test]
    fn test_endpoint_encodes_account_id() {
        let client = ApiClient::new("https://api.example.com").expect("valid base url");
        let url = client.endpoint(&["accounts", "a/b c"]).expect("endpoint");
        assert_eq!(url.as_str(), "https://api.example.com/accounts/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:ops@example.com"),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_token_response_defaults_type() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc123"}"#).expect("parse token");
        assert_eq!(token.access_token, "abc123");
        assert_eq!(token.token_type, "bearer");
    }

    #[test]
    fn test_account_limit_never_zero() {
        let client = ApiClient::new("https://api.example.com")
            .expect("valid base url")
            .with_account_limit(0);
        assert_eq!(client.account_limit, 1);
    }
}
