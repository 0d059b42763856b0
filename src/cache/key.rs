//! Composite cache keys.

use std::fmt;

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
  /// Resource kind or sub-resource, e.g. `products`, `search`
  Name(String),
  /// Numeric identity of a record
  Id(i64),
  /// Request parameters, kept sorted by name
  Params(Vec<(String, String)>),
}

/// Key addressing one cached query, e.g. `["products", 5]`.
///
/// Keys are compared part by part. A key covers every key it is a prefix of,
/// so invalidating `["products"]` reaches `["products", 5]` as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
  pub fn new(name: impl Into<String>) -> Self {
    Self(vec![KeyPart::Name(name.into())])
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.0.push(KeyPart::Name(name.into()));
    self
  }

  pub fn id(mut self, id: i64) -> Self {
    self.0.push(KeyPart::Id(id));
    self
  }

  /// Append a parameter set. Order of `params` does not matter.
  pub fn params<I, K, V>(mut self, params: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let mut params: Vec<(String, String)> = params
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .collect();
    params.sort();
    self.0.push(KeyPart::Params(params));
    self
  }

  pub fn parts(&self) -> &[KeyPart] {
    &self.0
  }

  /// Whether `prefix` covers this key.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for KeyPart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyPart::Name(name) => write!(f, "{:?}", name),
      KeyPart::Id(id) => write!(f, "{}", id),
      KeyPart::Params(params) => {
        f.write_str("{")?;
        for (i, (k, v)) in params.iter().enumerate() {
          if i > 0 {
            f.write_str(",")?;
          }
          write!(f, "{:?}:{:?}", k, v)?;
        }
        f.write_str("}")
      }
    }
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    for (i, part) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(",")?;
      }
      write!(f, "{}", part)?;
    }
    f.write_str("]")
  }
}
