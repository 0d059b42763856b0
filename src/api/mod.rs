//! HTTP access to the demo backend.
//!
//! [`ApiClient`] knows how to talk JSON to a base URL; the `auth` and
//! `products` modules map each endpoint to a typed call. Nothing here caches
//! or retries.

pub mod auth;
mod client;
mod error;
pub mod products;
mod types;

pub use client::{ApiClient, ApiClientOptions, HeaderProvider, ResponseErrorHook};
pub use error::ApiError;
pub use types::{
  CreateProductRequest, Dimensions, LoginRequest, LoginResponse, Product, ProductsQuery,
  ProductsResponse, RefreshRequest, RefreshResponse, UpdateProductRequest,
};
