//! Auth endpoints.

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};
use crate::store::User;

/// Lifetime requested for refreshed access tokens.
pub const REFRESH_EXPIRES_IN_MINS: u32 = 30;

pub async fn login(client: &ApiClient, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
  client.post("/auth/login", request).await
}

/// The user owning the current bearer token.
pub async fn me(client: &ApiClient) -> Result<User, ApiError> {
  client.get("/auth/me").await
}

pub async fn refresh_token(
  client: &ApiClient,
  refresh_token: &str,
) -> Result<RefreshResponse, ApiError> {
  let body = RefreshRequest {
    refresh_token: refresh_token.to_string(),
    expires_in_mins: REFRESH_EXPIRES_IN_MINS,
  };
  client.post("/auth/refresh", &body).await
}
