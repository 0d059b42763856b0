//! Cache keys of the backend resources.

use crate::api::ProductsQuery;
use crate::cache::QueryKey;

/// Queries the client knows how to cache.
#[derive(Clone, Debug)]
pub enum ApiQueryKey {
  /// One page of the product list
  Products(ProductsQuery),
  /// A single product by id
  Product(i64),
  /// Full-text product search
  ProductSearch(String),
  /// The signed-in user
  Me,
}

impl ApiQueryKey {
  pub fn key(&self) -> QueryKey {
    match self {
      Self::Products(query) => all_products().params(query.params()),
      Self::Product(id) => all_products().id(*id),
      Self::ProductSearch(q) => all_products()
        .name("search")
        .params([("q", normalize_search(q))]),
      Self::Me => auth().name("me"),
    }
  }

  pub fn description(&self) -> String {
    match self {
      Self::Products(query) => match (query.limit, query.skip) {
        (Some(limit), Some(skip)) => format!("products {}..{}", skip, skip + limit),
        (Some(limit), None) => format!("first {} products", limit),
        _ => "products".to_string(),
      },
      Self::Product(id) => format!("product {}", id),
      Self::ProductSearch(q) => format!("products matching {:?}", q),
      Self::Me => "current user".to_string(),
    }
  }
}

/// Covers every product key: lists, searches and single products.
pub fn all_products() -> QueryKey {
  QueryKey::new("products")
}

/// Covers every auth key.
pub fn auth() -> QueryKey {
  QueryKey::new("auth")
}

/// Trim and lowercase so equivalent searches share an entry.
fn normalize_search(q: &str) -> String {
  q.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_are_covered_by_resource_prefix() {
    let products = all_products();
    assert!(ApiQueryKey::Product(5).key().starts_with(&products));
    assert!(ApiQueryKey::Products(ProductsQuery::page(10, 0))
      .key()
      .starts_with(&products));
    assert!(ApiQueryKey::ProductSearch("phone".to_string())
      .key()
      .starts_with(&products));
    assert!(!ApiQueryKey::Me.key().starts_with(&products));
    assert!(ApiQueryKey::Me.key().starts_with(&auth()));
  }

  #[test]
  fn test_key_shapes() {
    assert_eq!(ApiQueryKey::Product(5).key().to_string(), r#"["products",5]"#);
    assert_eq!(
      ApiQueryKey::Products(ProductsQuery::page(10, 20)).key().to_string(),
      r#"["products",{"limit":"10","skip":"20"}]"#
    );
    assert_eq!(ApiQueryKey::Me.key().to_string(), r#"["auth","me"]"#);
  }

  #[test]
  fn test_search_normalization() {
    assert_eq!(
      ApiQueryKey::ProductSearch("  Phone ".to_string()).key(),
      ApiQueryKey::ProductSearch("phone".to_string()).key()
    );
  }

  #[test]
  fn test_description() {
    assert_eq!(
      ApiQueryKey::Products(ProductsQuery::page(10, 20)).description(),
      "products 20..30"
    );
    assert_eq!(ApiQueryKey::Product(3).description(), "product 3");
  }
}
