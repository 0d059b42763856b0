//! Wiring of stores, HTTP client and query cache for one running client.

use color_eyre::Result;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiClientOptions, ApiError, LoginRequest};
use crate::cache::QueryClient;
use crate::config::{ApiConfig, Config, QueryConfig};
use crate::data::CachedApi;
use crate::store::{open_storage, AuthStore, SettingsStore, StateStorage, User};

/// `Authorization: Bearer <token>` when the session holds a token.
pub fn auth_headers(auth: &AuthStore) -> HeaderMap {
  let mut headers = HeaderMap::new();
  if let Some(token) = auth.token() {
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
      Ok(mut value) => {
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
      }
      Err(_) => warn!("stored token is not a valid header value, sending request without it"),
    }
  }
  headers
}

/// Everything a command needs: the two stores and the cached API.
pub struct AppState {
  pub auth: Arc<AuthStore>,
  pub settings: Arc<SettingsStore>,
  pub api: CachedApi,
  login_required: Arc<AtomicBool>,
}

impl AppState {
  pub fn new(config: &Config) -> Result<Self> {
    let storage = open_storage(&config.storage);
    Self::with_storage(&config.api, &config.query, storage)
  }

  /// Build on an explicit storage backend; both stores share it.
  pub fn with_storage(
    api: &ApiConfig,
    query: &QueryConfig,
    storage: Arc<dyn StateStorage>,
  ) -> Result<Self> {
    let auth = Arc::new(AuthStore::new(Arc::clone(&storage)));
    let settings = Arc::new(SettingsStore::new(storage));
    let login_required = Arc::new(AtomicBool::new(false));

    let cache = QueryClient::new()
      .with_stale_time(query.stale_time()?)
      .with_gc_time(query.gc_time()?);

    let header_auth = Arc::clone(&auth);
    let hook_auth = Arc::clone(&auth);
    let hook_cache = cache.clone();
    let hook_flag = Arc::clone(&login_required);

    let options = ApiClientOptions::new(api.base_url.clone())
      .timeout(api.timeout())
      .with_headers(move || auth_headers(&header_auth))
      .on_response_error(move |status| {
        if status == StatusCode::UNAUTHORIZED {
          warn!("server rejected the session, signing out");
          hook_auth.clear_auth();
          hook_cache.clear();
          hook_flag.store(true, Ordering::SeqCst);
        }
      });

    let client = ApiClient::new(options)?;

    Ok(Self {
      auth,
      settings,
      api: CachedApi::new(client, cache),
      login_required,
    })
  }

  /// Authenticate and store the session in one step.
  pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
    let response = self
      .api
      .login(&LoginRequest::new(username, password))
      .await?;

    let user = response.user;
    // Cached data may belong to a previous user
    self.api.cache().clear();
    self
      .auth
      .login(user.clone(), response.access_token, response.refresh_token);
    self.login_required.store(false, Ordering::SeqCst);
    info!(user = %user.display_name(), "signed in");

    Ok(user)
  }

  pub fn logout(&self) {
    self.auth.logout();
    self.api.cache().clear();
    info!("signed out");
  }

  /// Exchange the stored refresh token for a new access token.
  ///
  /// Returns `false` when there is no refresh token to use.
  pub async fn refresh(&self) -> Result<bool, ApiError> {
    let Some(refresh_token) = self.auth.refresh_token() else {
      return Ok(false);
    };

    let response = self.api.refresh_token(&refresh_token).await?;
    self.auth.set_token(Some(response.access_token));
    if response.refresh_token.is_some() {
      self.auth.set_refresh_token(response.refresh_token);
    }
    Ok(true)
  }

  /// Whether a rejected token forced a sign-out since the last call.
  pub fn take_login_required(&self) -> bool {
    self.login_required.swap(false, Ordering::SeqCst)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ProductsQuery;
  use crate::store::MemoryStorage;
  use serde_json::json;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn state_for(server: &MockServer) -> AppState {
    let api = ApiConfig {
      base_url: server.uri(),
      ..ApiConfig::default()
    };
    AppState::with_storage(&api, &QueryConfig::default(), Arc::new(MemoryStorage::new())).unwrap()
  }

  async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
      .and(path("/auth/login"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 1,
        "username": "emilys",
        "email": "emily.johnson@x.dummyjson.com",
        "firstName": "Emily",
        "lastName": "Johnson",
        "gender": "female",
        "image": "https://dummyjson.com/icon/emilys/128",
        "accessToken": "T",
        "refreshToken": "R"
      })))
      .mount(server)
      .await;
  }

  #[test]
  fn test_auth_headers_follow_token() {
    let auth = AuthStore::new(Arc::new(MemoryStorage::new()));
    assert!(auth_headers(&auth).get(AUTHORIZATION).is_none());

    auth.set_token(Some("T".to_string()));
    assert_eq!(
      auth_headers(&auth).get(AUTHORIZATION).unwrap(),
      &HeaderValue::from_static("Bearer T")
    );

    auth.logout();
    assert!(auth_headers(&auth).is_empty());
  }

  #[test]
  fn test_out_of_range_cache_times_fail_construction() {
    for query in [
      QueryConfig {
        stale_time_secs: 10_000_000_000_000_000,
        ..QueryConfig::default()
      },
      QueryConfig {
        gc_time_secs: u64::MAX,
        ..QueryConfig::default()
      },
    ] {
      let result =
        AppState::with_storage(&ApiConfig::default(), &query, Arc::new(MemoryStorage::new()));
      assert!(result.is_err());
    }
  }

  #[tokio::test]
  async fn test_login_then_list_sends_bearer() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
      .and(path("/products"))
      .and(header("Authorization", "Bearer T"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"products": [], "total": 0})))
      .expect(1)
      .mount(&server)
      .await;

    let state = state_for(&server);
    assert!(!state.auth.is_logged_in());

    let user = state.login("emilys", "emilyspass").await.unwrap();
    assert_eq!(user.username.as_deref(), Some("emilys"));
    assert!(state.auth.is_logged_in());
    assert_eq!(state.auth.token().as_deref(), Some("T"));

    state.api.products(&ProductsQuery::page(10, 0)).await.unwrap();
  }

  #[tokio::test]
  async fn test_unauthorized_response_signs_out() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
      .and(path("/auth/me"))
      .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token Expired!"})))
      .mount(&server)
      .await;

    let state = state_for(&server);
    state.login("emilys", "emilyspass").await.unwrap();
    assert!(!state.take_login_required());

    let err = state.api.me().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!state.auth.is_logged_in());
    assert_eq!(state.auth.token(), None);
    assert!(state.take_login_required());
    // The notice is consumed
    assert!(!state.take_login_required());
  }

  #[tokio::test]
  async fn test_other_errors_keep_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
      .and(path("/products/1"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let state = state_for(&server);
    state.login("emilys", "emilyspass").await.unwrap();
    assert!(state.api.product(1).await.is_err());
    assert!(state.auth.is_logged_in());
    assert!(!state.take_login_required());
  }

  #[tokio::test]
  async fn test_refresh_replaces_tokens() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
      .and(path("/auth/refresh"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!(
        {"accessToken": "T2", "refreshToken": "R2"}
      )))
      .expect(1)
      .mount(&server)
      .await;

    let state = state_for(&server);
    assert!(!state.refresh().await.unwrap());

    state.login("emilys", "emilyspass").await.unwrap();
    assert!(state.refresh().await.unwrap());
    assert_eq!(state.auth.token().as_deref(), Some("T2"));
    assert_eq!(state.auth.refresh_token().as_deref(), Some("R2"));
    assert!(state.auth.is_logged_in());
  }

  #[tokio::test]
  async fn test_logout_clears_session_and_cache() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
      .and(path("/products/1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
      .mount(&server)
      .await;

    let state = state_for(&server);
    state.login("emilys", "emilyspass").await.unwrap();
    state.api.product(1).await.unwrap();
    assert!(!state.api.cache().is_empty());

    state.logout();
    assert_eq!(state.auth.snapshot(), crate::store::Session::default());
    assert!(state.api.cache().is_empty());
  }
}
