// Token manager
// Single source of truth for the current token pair: expiry checks,
// single-flight refresh, and the periodic proactive-refresh task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;

use super::decode::decode_token;
use super::store::TokenStore;
use super::types::{RefreshRequest, RefreshResponse, TokenPair};

/// Storage and refresh settings for the token manager.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Full URL of the token refresh endpoint
    pub refresh_url: String,

    /// Storage key for the access token
    pub access_key: String,

    /// Storage key for the refresh token
    pub refresh_key: String,

    /// Proactive refresh window in seconds (default: 300 = 5 minutes)
    pub refresh_threshold: i64,

    /// Durable-tier lifetime of the access token, in days
    pub access_ttl_days: i64,

    /// Durable-tier lifetime of the refresh token, in days
    pub refresh_ttl_days: i64,

    /// Timeout for the refresh network call, in seconds
    pub request_timeout: u64,
}

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

/// Token manager
/// Owns the token pair across both storage tiers and guarantees at most one
/// refresh call in flight at a time.
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: TokenStore,
    client: Client,
    config: TokenConfig,

    /// In-flight refresh slot: concurrent callers await the stored future
    /// instead of issuing a second network call.
    inflight: Mutex<Option<RefreshFuture>>,
}

impl Clone for TokenManager {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl TokenManager {
    pub fn new(store: TokenStore, config: TokenConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent(format!(
                "stockdesk/{} {}",
                env!("CARGO_PKG_VERSION"),
                machine_fingerprint()
            ))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                client,
                config,
                inflight: Mutex::new(None),
            }),
        })
    }

    pub fn set_access_token(&self, token: &str) {
        let cfg = &self.inner.config;
        self.inner.store.set(&cfg.access_key, token, cfg.access_ttl_days);
    }

    pub fn set_refresh_token(&self, token: &str) {
        let cfg = &self.inner.config;
        self.inner
            .store
            .set(&cfg.refresh_key, token, cfg.refresh_ttl_days);
    }

    pub fn get_access_token(&self) -> Option<String> {
        self.inner.store.get(&self.inner.config.access_key)
    }

    pub fn get_refresh_token(&self) -> Option<String> {
        self.inner.store.get(&self.inner.config.refresh_key)
    }

    /// Store a freshly minted pair (login or rotation) in both tiers.
    pub fn install_pair(&self, pair: &TokenPair) {
        self.set_access_token(&pair.access);
        self.set_refresh_token(&pair.refresh);
    }

    /// Remove token material from every storage tier. Idempotent.
    pub fn clear_tokens(&self) {
        self.inner.store.clear();
    }

    /// True once `now` has reached the token's `exp`. An undecodable token
    /// counts as expired.
    pub fn is_token_expired(&self, token: &str) -> bool {
        match decode_token(token) {
            Ok(claims) => Utc::now().timestamp() >= claims.exp,
            Err(_) => true,
        }
    }

    /// True once the token is inside the proactive refresh window.
    pub fn is_token_expiring_soon(&self, token: &str) -> bool {
        match decode_token(token) {
            Ok(claims) => Utc::now().timestamp() + self.inner.config.refresh_threshold >= claims.exp,
            Err(_) => true,
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Single-flight: if a refresh is already in progress, the caller awaits
    /// the same outstanding operation. On any failure the stored pair is
    /// cleared and `None` is returned; the caller decides what to do next.
    pub async fn refresh_access_token(&self) -> Option<String> {
        let fut = {
            let mut slot = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut: RefreshFuture = async move {
                        let result = perform_refresh(&inner).await;

                        // Free the slot so the next refresh starts fresh.
                        let mut slot = inner
                            .inflight
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        *slot = None;

                        result
                    }
                    .boxed()
                    .shared();

                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        fut.await
    }

    /// The single entry point for request-issuing code.
    ///
    /// Returns a token suitable for the `Authorization` header, refreshing
    /// when the current one is expired or inside the refresh window. When a
    /// proactive refresh fails but the current token has not actually
    /// expired, the current token is returned so callers are not blocked.
    pub async fn ensure_valid_token(&self) -> Option<String> {
        let current = self.get_access_token()?;

        if self.is_token_expired(&current) {
            return self.refresh_access_token().await;
        }

        if self.is_token_expiring_soon(&current) {
            match self.refresh_access_token().await {
                Some(fresh) => return Some(fresh),
                None => {
                    tracing::warn!("Proactive refresh failed, continuing with current token");
                    return Some(current);
                }
            }
        }

        Some(current)
    }

    /// Start the periodic maintenance task: every `interval_secs` it checks
    /// the stored token and refreshes proactively when it is expiring soon.
    /// The task runs until the returned handle is stopped or dropped.
    pub fn spawn_maintenance(&self, interval_secs: u64) -> MaintenanceTask {
        let manager = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(token) = manager.get_access_token() else {
                    continue;
                };

                if manager.is_token_expiring_soon(&token) {
                    tracing::debug!("Maintenance: token expiring soon, refreshing");
                    if manager.refresh_access_token().await.is_none() {
                        tracing::warn!("Maintenance refresh failed");
                    }
                }
            }
        });

        MaintenanceTask { handle }
    }
}

async fn perform_refresh(inner: &Arc<Inner>) -> Option<String> {
    let Some(refresh_token) = inner.store.get(&inner.config.refresh_key) else {
        tracing::warn!("No refresh token available");
        inner.store.clear();
        return None;
    };

    tracing::debug!("Refreshing access token...");

    let request = RefreshRequest {
        refresh: refresh_token,
    };

    let response = match inner
        .client
        .post(&inner.config.refresh_url)
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Token refresh request failed");
            inner.store.clear();
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "Token refresh rejected");
        inner.store.clear();
        return None;
    }

    let data: RefreshResponse = match response.json().await {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse token refresh response");
            inner.store.clear();
            return None;
        }
    };

    if data.access.is_empty() {
        tracing::error!("Token refresh response contains an empty access token");
        inner.store.clear();
        return None;
    }

    inner
        .store
        .set(&inner.config.access_key, &data.access, inner.config.access_ttl_days);

    if let Some(ref rotated) = data.refresh {
        inner
            .store
            .set(&inner.config.refresh_key, rotated, inner.config.refresh_ttl_days);
    }

    tracing::info!("Access token refreshed");
    Some(data.access)
}

/// Handle owning the background maintenance task.
pub struct MaintenanceTask {
    handle: tokio::task::JoinHandle<()>,
}

impl MaintenanceTask {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for MaintenanceTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Machine fingerprint for the User-Agent header
fn machine_fingerprint() -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let mut hasher = DefaultHasher::new();
    hostname.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
