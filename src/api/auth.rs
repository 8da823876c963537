// Login, logout, and profile fetch

use serde::{Deserialize, Serialize};

use super::client::ApiClient;
use super::models::UserProfile;
use crate::error::Result;
use crate::token::TokenPair;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

/// Log in with credentials, install the returned token pair in both storage
/// tiers, and fetch the user profile.
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<UserProfile> {
    let response: LoginResponse = client
        .post_json("/user/login/", &LoginRequest { email, password })
        .await?;

    client.tokens().install_pair(&TokenPair {
        access: response.access,
        refresh: response.refresh,
    });

    tracing::info!(email = email, "Logged in");
    current_user(client).await
}

/// Fetch the profile of the authenticated user.
pub async fn current_user(client: &ApiClient) -> Result<UserProfile> {
    client.get_json("/user/me/", &[]).await
}

/// End the session locally: remove token material from every storage tier.
pub fn logout(client: &ApiClient) {
    client.tokens().clear_tokens();
    tracing::info!("Logged out");
}
