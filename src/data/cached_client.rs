//! API client with transparent caching.

use tracing::debug;

use crate::api::{
  self, ApiClient, ApiError, CreateProductRequest, LoginRequest, LoginResponse, Product,
  ProductsQuery, ProductsResponse, RefreshResponse, UpdateProductRequest,
};
use crate::cache::{CacheResult, QueryClient};
use crate::store::User;

use super::keys::{self, ApiQueryKey};

/// Backend client with transparent caching.
///
/// Reads go through the [`QueryClient`]; every mutation lists the keys it
/// makes stale and invalidates them once the server has accepted it.
#[derive(Clone)]
pub struct CachedApi {
  inner: ApiClient,
  cache: QueryClient,
}

impl CachedApi {
  pub fn new(inner: ApiClient, cache: QueryClient) -> Self {
    Self { inner, cache }
  }

  pub fn client(&self) -> &ApiClient {
    &self.inner
  }

  pub fn cache(&self) -> &QueryClient {
    &self.cache
  }

  /// One page of products.
  pub async fn products(
    &self,
    query: &ProductsQuery,
  ) -> Result<CacheResult<ProductsResponse>, ApiError> {
    let query_key = ApiQueryKey::Products(query.clone());
    debug!(query = %query_key.description(), "reading");

    self
      .cache
      .fetch_query(&query_key.key(), || {
        let inner = self.inner.clone();
        let query = query.clone();
        async move { api::products::list(&inner, &query).await }
      })
      .await
  }

  /// A single product. Ids below 1 never reach the network and yield `None`.
  pub async fn product(&self, id: i64) -> Result<Option<CacheResult<Product>>, ApiError> {
    let query_key = ApiQueryKey::Product(id);
    debug!(query = %query_key.description(), "reading");

    self
      .cache
      .fetch_query_enabled(&query_key.key(), id > 0, || {
        let inner = self.inner.clone();
        async move { api::products::get(&inner, id).await }
      })
      .await
  }

  pub async fn search_products(&self, q: &str) -> Result<CacheResult<ProductsResponse>, ApiError> {
    let query_key = ApiQueryKey::ProductSearch(q.to_string());
    debug!(query = %query_key.description(), "reading");

    self
      .cache
      .fetch_query(&query_key.key(), || {
        let inner = self.inner.clone();
        let q = q.trim().to_string();
        async move { api::products::search(&inner, &q).await }
      })
      .await
  }

  /// The user owning the current token.
  pub async fn me(&self) -> Result<CacheResult<User>, ApiError> {
    self
      .cache
      .fetch_query(&ApiQueryKey::Me.key(), || {
        let inner = self.inner.clone();
        async move { api::auth::me(&inner).await }
      })
      .await
  }

  pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
    self
      .cache
      .mutate(&[keys::auth()], api::auth::login(&self.inner, request))
      .await
  }

  pub async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
    api::auth::refresh_token(&self.inner, refresh_token).await
  }

  pub async fn create_product(&self, request: &CreateProductRequest) -> Result<Product, ApiError> {
    self
      .cache
      .mutate(
        &[keys::all_products()],
        api::products::create(&self.inner, request),
      )
      .await
  }

  pub async fn update_product(
    &self,
    id: i64,
    request: &UpdateProductRequest,
  ) -> Result<Product, ApiError> {
    self
      .cache
      .mutate(
        &[keys::all_products(), ApiQueryKey::Product(id).key()],
        api::products::update(&self.inner, id, request),
      )
      .await
  }

  pub async fn delete_product(&self, id: i64) -> Result<Product, ApiError> {
    self
      .cache
      .mutate(
        &[keys::all_products()],
        api::products::delete(&self.inner, id),
      )
      .await
  }
}
