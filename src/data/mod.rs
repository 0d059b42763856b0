//! Cached access to the backend resources.

mod cached_client;
pub mod keys;

pub use cached_client::CachedApi;
pub use keys::ApiQueryKey;
