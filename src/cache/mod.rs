//! In-memory query cache.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Keys cached values by a composite [`QueryKey`]
//! - Serves values without a network call while they are fresh
//! - Shares one in-flight request between concurrent readers of a key
//! - Invalidates keys (and every key they cover) after successful mutations
//! - Forgets entries that stay unused for a while

mod client;
mod key;
mod result;

pub use client::QueryClient;
pub use key::{KeyPart, QueryKey};
pub use result::{CacheResult, CacheSource};
