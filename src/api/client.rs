// Authenticated request pipeline
// Attaches a valid bearer token to every outbound request and transparently
// recovers from a single authentication failure per request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{api_error_from_body, ClientError, Result};
use crate::token::TokenManager;

type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// HTTP client for the warehouse API.
///
/// Every request goes through the same pipeline: obtain a valid token
/// (refreshing proactively when needed), attach it, send, and on a first
/// 401 refresh once and retry once. All failures are normalized into
/// `ClientError` before they reach calling code.
pub struct ApiClient {
    client: Client,
    tokens: TokenManager,
    base_url: String,

    /// Invoked exactly once per irrecoverable authentication failure; the
    /// CLI uses it to tell the user to log in again.
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClient {
    pub fn new(tokens: TokenManager, base_url: String, request_timeout: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
            on_session_expired: None,
        })
    }

    pub fn with_session_expired_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute a request through the pipeline.
    ///
    /// A request is retried at most once, and only for a 401; the retry
    /// reuses the original method, body, and headers with a fresh
    /// `Authorization`. Non-401 failures are never retried.
    pub async fn execute(&self, mut request: Request) -> Result<Response> {
        if let Some(token) = self.tokens.ensure_valid_token().await {
            set_bearer(&mut request, &token)?;
        } else {
            // No token: send unauthenticated and let the server decide.
            tracing::debug!(url = %request.url(), "Sending request without credentials");
        }

        let mut retried = false;

        loop {
            let attempt = request
                .try_clone()
                .ok_or_else(|| ClientError::Internal(anyhow::anyhow!("Request body is not cloneable")))?;

            let response = match self.client.execute(attempt).await {
                Ok(response) => response,
                Err(e) => return Err(ClientError::from_transport(e)),
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            match status.as_u16() {
                401 if !retried => {
                    tracing::warn!(url = %request.url(), "Received 401, refreshing token and retrying");

                    match self.tokens.refresh_access_token().await {
                        Some(token) => {
                            set_bearer(&mut request, &token)?;
                            retried = true;
                        }
                        None => return Err(self.auth_failure(401)),
                    }
                }

                // Second 401, or a 403 at any point: the session is dead.
                401 | 403 => return Err(self.auth_failure(status.as_u16())),

                _ => {
                    let body = response.text().await.unwrap_or_default();
                    tracing::warn!(
                        status = status.as_u16(),
                        url = %request.url(),
                        body = %body,
                        "Request failed with error response"
                    );
                    return Err(api_error_from_body(status.as_u16(), &body));
                }
            }
        }
    }

    fn auth_failure(&self, status: u16) -> ClientError {
        tracing::warn!(status = status, "Authentication irrecoverably failed, clearing session");
        self.tokens.clear_tokens();

        if let Some(hook) = &self.on_session_expired {
            hook();
        }

        ClientError::Auth { status }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let request = self
            .client
            .get(self.url(path))
            .query(query)
            .build()
            .map_err(|e| ClientError::Internal(anyhow::Error::new(e).context("Failed to build request")))?;

        self.decode_body(self.execute(request).await?).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self
            .client
            .post(self.url(path))
            .json(body)
            .build()
            .map_err(|e| ClientError::Internal(anyhow::Error::new(e).context("Failed to build request")))?;

        self.decode_body(self.execute(request).await?).await
    }

    pub async fn patch_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self
            .client
            .patch(self.url(path))
            .json(body)
            .build()
            .map_err(|e| ClientError::Internal(anyhow::Error::new(e).context("Failed to build request")))?;

        self.decode_body(self.execute(request).await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(path))
            .build()
            .map_err(|e| ClientError::Internal(anyhow::Error::new(e).context("Failed to build request")))?;

        self.execute(request).await?;
        Ok(())
    }

    async fn decode_body<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        response.json().await.map_err(|e| {
            ClientError::Internal(anyhow::Error::new(e).context("Failed to decode response body"))
        })
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<()> {
    let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ClientError::Internal(anyhow::Error::new(e).context("Invalid token bytes")))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{TokenConfig, TokenStore};

    fn test_client(base_url: &str) -> ApiClient {
        let tokens = TokenManager::new(
            TokenStore::open_in_memory().unwrap(),
            TokenConfig {
                refresh_url: format!("{}/api/token/refresh/", base_url),
                access_key: "stockdesk_access".to_string(),
                refresh_key: "stockdesk_refresh".to_string(),
                refresh_threshold: 300,
                access_ttl_days: 1,
                refresh_ttl_days: 7,
                request_timeout: 5,
            },
        )
        .unwrap();

        ApiClient::new(tokens, base_url.to_string(), 5).unwrap()
    }

    #[test]
    fn test_url_join_strips_trailing_slash() {
        let client = test_client("http://127.0.0.1:9/");
        assert_eq!(
            client.url("/api/v1/products/"),
            "http://127.0.0.1:9/api/v1/products/"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is not listening in the test environment.
        let client = test_client("http://127.0.0.1:9");
        let request = client.client.get(client.url("/api/v1/products/")).build().unwrap();

        match client.execute(request).await {
            Err(ClientError::Network(_)) => {}
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[test]
    fn test_set_bearer_replaces_header() {
        let client = test_client("http://127.0.0.1:9");
        let mut request = client.client.get("http://127.0.0.1:9/x").build().unwrap();

        set_bearer(&mut request, "first").unwrap();
        set_bearer(&mut request, "second").unwrap();

        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer second"
        );
    }
}
