//! Request and response bodies of the demo backend.
//!
//! Field names follow the backend's camelCase JSON. Most product fields are
//! defaulted because several endpoints echo back only part of a product.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::store::User;

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub expires_in_mins: Option<u32>,
}

impl LoginRequest {
  pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      username: username.into(),
      password: password.into(),
      expires_in_mins: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
  pub access_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  #[serde(flatten)]
  pub user: User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
  pub refresh_token: String,
  pub expires_in_mins: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
  #[serde(alias = "token")]
  pub access_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
  #[serde(default)]
  pub width: f64,
  #[serde(default)]
  pub height: f64,
  #[serde(default)]
  pub depth: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
  pub id: i64,
  pub title: String,
  pub description: String,
  pub price: f64,
  pub discount_percentage: f64,
  pub rating: f64,
  pub stock: i64,
  pub brand: Option<String>,
  pub category: String,
  pub thumbnail: String,
  pub images: Vec<String>,
  pub sku: Option<String>,
  pub weight: Option<f64>,
  pub dimensions: Option<Dimensions>,
  pub warranty_information: Option<String>,
  pub shipping_information: Option<String>,
  pub return_policy: Option<String>,
  pub minimum_order_quantity: Option<i64>,
  /// Set on delete responses
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_deleted: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deleted_on: Option<String>,
  /// Fields this client does not model (tags, reviews, meta, ...)
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductsResponse {
  #[serde(default)]
  pub products: Vec<Product>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub skip: u64,
  #[serde(default)]
  pub limit: u64,
}

/// Paging and projection for the product list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ProductsQuery {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub skip: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub select: Option<String>,
}

impl ProductsQuery {
  pub fn page(limit: u32, skip: u32) -> Self {
    Self {
      limit: Some(limit),
      skip: Some(skip),
      select: None,
    }
  }

  /// Set parameters as (name, value) pairs, in a stable order.
  pub fn params(&self) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(limit) = self.limit {
      params.push(("limit", limit.to_string()));
    }
    if let Some(skip) = self.skip {
      params.push(("skip", skip.to_string()));
    }
    if let Some(select) = &self.select {
      params.push(("select", select.clone()));
    }
    params
  }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
  pub title: String,
  pub description: String,
  pub price: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub brand: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub brand: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
}

impl UpdateProductRequest {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.price.is_none()
      && self.brand.is_none()
      && self.category.is_none()
  }
}
