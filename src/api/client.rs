//! HTTP client bound to one API base URL.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::ApiError;

/// Produces extra headers for each outgoing request.
pub type HeaderProvider = Arc<dyn Fn() -> HeaderMap + Send + Sync>;

/// Called with the status of every error response before it is returned.
pub type ResponseErrorHook = Arc<dyn Fn(StatusCode) + Send + Sync>;

/// Options for [`ApiClient::new`].
#[derive(Clone)]
pub struct ApiClientOptions {
  pub base_url: String,
  pub timeout: Duration,
  get_headers: Option<HeaderProvider>,
  on_response_error: Option<ResponseErrorHook>,
}

impl ApiClientOptions {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      timeout: Duration::from_secs(30),
      get_headers: None,
      on_response_error: None,
    }
  }

  /// Headers merged into every request, evaluated right before it is sent.
  pub fn with_headers<F>(mut self, get_headers: F) -> Self
  where
    F: Fn() -> HeaderMap + Send + Sync + 'static,
  {
    self.get_headers = Some(Arc::new(get_headers));
    self
  }

  /// Hook for error statuses (4xx/5xx). Not called for transport errors.
  pub fn on_response_error<F>(mut self, hook: F) -> Self
  where
    F: Fn(StatusCode) + Send + Sync + 'static,
  {
    self.on_response_error = Some(Arc::new(hook));
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

impl fmt::Debug for ApiClientOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ApiClientOptions")
      .field("base_url", &self.base_url)
      .field("timeout", &self.timeout)
      .field("get_headers", &self.get_headers.is_some())
      .field("on_response_error", &self.on_response_error.is_some())
      .finish()
  }
}

/// JSON API client.
///
/// Holds no credentials of its own; whatever `get_headers` returns at send
/// time is what goes on the wire.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: String,
  get_headers: Option<HeaderProvider>,
  on_response_error: Option<ResponseErrorHook>,
}

impl ApiClient {
  pub fn new(options: ApiClientOptions) -> Result<Self, ApiError> {
    let base_url = options.base_url.trim_end_matches('/').to_string();
    Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let http = reqwest::Client::builder()
      .timeout(options.timeout)
      .default_headers(default_headers)
      .build()?;

    Ok(Self {
      http,
      base_url,
      get_headers: options.get_headers,
      on_response_error: options.on_response_error,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Resolve `path` against the base URL, keeping any base path prefix.
  fn url(&self, path: &str) -> Result<Url, ApiError> {
    let joined = if path.starts_with('/') {
      format!("{}{}", self.base_url, path)
    } else {
      format!("{}/{}", self.base_url, path)
    };
    Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", joined, e)))
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
    Ok(self.http.request(method, self.url(path)?))
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.send(self.request(Method::GET, path)?).await
  }

  pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
  {
    self.send(self.request(Method::GET, path)?.query(query)).await
  }

  pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self.send(self.request(Method::POST, path)?.json(body)).await
  }

  pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self.send(self.request(Method::PUT, path)?.json(body)).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.send(self.request(Method::DELETE, path)?).await
  }

  async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
    let mut request = builder.build()?;

    if let Some(get_headers) = &self.get_headers {
      request.headers_mut().extend(get_headers());
    }

    let method = request.method().clone();
    let url = request.url().clone();
    debug!(%method, %url, "sending request");

    let response = self.http.execute(request).await.map_err(|e| {
      debug!(%method, %url, error = %e, "request failed");
      ApiError::from(e)
    })?;

    let status = response.status();
    debug!(%method, %url, %status, "received response");

    if status.is_client_error() || status.is_server_error() {
      let body = response.text().await.unwrap_or_default();
      if let Some(hook) = &self.on_response_error {
        hook(status);
      }
      return Err(ApiError::Status { status, body });
    }

    let bytes = response.bytes().await?;
    // 204 and friends: decode as JSON null
    let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
  }
}

impl fmt::Debug for ApiClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ApiClient")
      .field("base_url", &self.base_url)
      .finish_non_exhaustive()
  }
}
