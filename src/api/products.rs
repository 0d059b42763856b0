//! Product endpoints.

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{
  CreateProductRequest, Product, ProductsQuery, ProductsResponse, UpdateProductRequest,
};

/// One page of products.
pub async fn list(client: &ApiClient, query: &ProductsQuery) -> Result<ProductsResponse, ApiError> {
  client.get_with_query("/products", &query.params()).await
}

pub async fn get(client: &ApiClient, id: i64) -> Result<Product, ApiError> {
  client.get(&format!("/products/{}", id)).await
}

pub async fn search(client: &ApiClient, query: &str) -> Result<ProductsResponse, ApiError> {
  client
    .get_with_query("/products/search", &[("q", query)])
    .await
}

pub async fn create(
  client: &ApiClient,
  request: &CreateProductRequest,
) -> Result<Product, ApiError> {
  client.post("/products/add", request).await
}

pub async fn update(
  client: &ApiClient,
  id: i64,
  request: &UpdateProductRequest,
) -> Result<Product, ApiError> {
  client.put(&format!("/products/{}", id), request).await
}

/// Returns the deleted product, flagged with `isDeleted`.
pub async fn delete(client: &ApiClient, id: i64) -> Result<Product, ApiError> {
  client.delete(&format!("/products/{}", id)).await
}
