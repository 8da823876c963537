// Token types

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The current access/refresh token pair.
///
/// The access token is a JWT with a decodable payload; the refresh token is
/// treated as opaque and only ever sent back to the refresh endpoint.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Decoded JWT payload claims.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since epoch
    pub exp: i64,

    /// Subject identity (user id or similar)
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,
}

impl TokenClaims {
    /// Expiry as a UTC timestamp, if `exp` is within the representable range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// A token that could not be parsed as a JWT.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed token: {reason}")]
pub struct MalformedToken {
    pub reason: &'static str,
}

/// Token refresh request
#[derive(Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Token refresh response
#[derive(Deserialize)]
pub struct RefreshResponse {
    pub access: String,

    /// Present when the server rotates refresh tokens.
    #[serde(default)]
    pub refresh: Option<String>,
}
