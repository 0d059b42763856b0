//! Keyed query cache with request de-duplication and invalidation.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::key::QueryKey;
use super::result::CacheResult;
use crate::api::ApiError;

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue, ApiError>>>;

struct CachedValue {
  value: AnyValue,
  fetched_at: DateTime<Utc>,
}

struct Entry {
  value: Option<CachedValue>,
  /// Set by invalidation; the next read bypasses freshness
  invalidated: bool,
  /// Fetch every reader of this key currently waits on, tagged with its id
  in_flight: Option<(u64, SharedFetch)>,
  last_used: DateTime<Utc>,
}

impl Entry {
  fn new(now: DateTime<Utc>) -> Self {
    Self {
      value: None,
      invalidated: false,
      in_flight: None,
      last_used: now,
    }
  }
}

/// Client-side query cache.
///
/// Values of any `Clone + Send + Sync` type are stored per [`QueryKey`]. A
/// value is served from memory while younger than `stale_time` and not
/// invalidated; otherwise it is fetched again, with concurrent readers of the
/// same key sharing a single fetch. Entries unused for `gc_time` are dropped.
pub struct QueryClient {
  entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
  next_fetch_id: Arc<AtomicU64>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// How long an idle entry is kept
  gc_time: Duration,
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new()
  }
}

impl QueryClient {
  pub fn new() -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      next_fetch_id: Arc::new(AtomicU64::new(0)),
      stale_time: Duration::seconds(60),
      gc_time: Duration::minutes(5),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Set how long unused entries survive.
  pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    // Entries are only ever replaced field by field, so a poisoned map is
    // still usable
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn is_stale(&self, fetched_at: DateTime<Utc>) -> bool {
    Utc::now() - fetched_at >= self.stale_time
  }

  /// Read `key` through the cache.
  ///
  /// 1. Fresh cached value: returned, `fetcher` is not called
  /// 2. Fetch already in flight for `key`: wait for it
  /// 3. Otherwise: start `fetcher` and store its result on success
  ///
  /// Errors are returned to every waiting caller and never cached.
  pub async fn fetch_query<T, F, Fut>(
    &self,
    key: &QueryKey,
    fetcher: F,
  ) -> Result<CacheResult<T>, ApiError>
  where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.collect_garbage();

    let (fetch_id, fetch) = {
      let mut entries = self.lock();
      let now = Utc::now();
      let entry = entries
        .entry(key.clone())
        .or_insert_with(|| Entry::new(now));
      entry.last_used = now;

      if let Some(cached) = &entry.value {
        if !entry.invalidated && !self.is_stale(cached.fetched_at) {
          if let Some(data) = cached.value.downcast_ref::<T>() {
            debug!(%key, "serving fresh cached value");
            return Ok(CacheResult::from_cache(data.clone(), cached.fetched_at));
          }
        }
      }

      let joined = entry
        .in_flight
        .as_ref()
        .map(|(id, fetch)| (*id, fetch.clone()));
      match joined {
        Some(in_flight) => {
          debug!(%key, "joining in-flight fetch");
          in_flight
        }
        None => {
          let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
          let fetch = fetcher()
            .map(|result| result.map(|data| Arc::new(data) as AnyValue))
            .boxed()
            .shared();
          entry.in_flight = Some((id, fetch.clone()));
          debug!(%key, "fetching");
          (id, fetch)
        }
      }
    };

    let result = fetch.await;
    self.settle(key, fetch_id, &result);

    let value = result?;
    let data = value
      .downcast_ref::<T>()
      .cloned()
      .ok_or_else(|| ApiError::CacheType(key.to_string()))?;
    Ok(CacheResult::from_network(data))
  }

  /// Like [`fetch_query`](Self::fetch_query), but a disabled query returns
  /// `None` without touching the cache or the network.
  pub async fn fetch_query_enabled<T, F, Fut>(
    &self,
    key: &QueryKey,
    enabled: bool,
    fetcher: F,
  ) -> Result<Option<CacheResult<T>>, ApiError>
  where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if !enabled {
      debug!(%key, "query disabled");
      return Ok(None);
    }
    self.fetch_query(key, fetcher).await.map(Some)
  }

  /// Record the outcome of fetch `fetch_id`, unless it was detached by an
  /// invalidation or already recorded by another waiter.
  fn settle(&self, key: &QueryKey, fetch_id: u64, result: &Result<AnyValue, ApiError>) {
    let mut entries = self.lock();
    let Some(entry) = entries.get_mut(key) else {
      return;
    };
    if !matches!(&entry.in_flight, Some((id, _)) if *id == fetch_id) {
      return;
    }

    entry.in_flight = None;
    match result {
      Ok(value) => {
        entry.value = Some(CachedValue {
          value: Arc::clone(value),
          fetched_at: Utc::now(),
        });
        entry.invalidated = false;
      }
      Err(e) => debug!(%key, error = %e, "fetch failed"),
    }
  }

  /// Run a mutation and, once it has succeeded, invalidate every key
  /// covered by `invalidates`. A failed mutation invalidates nothing.
  pub async fn mutate<T, Fut>(&self, invalidates: &[QueryKey], mutation: Fut) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let data = mutation.await?;
    for key in invalidates {
      self.invalidate_queries(key);
    }
    Ok(data)
  }

  /// Mark every entry covered by `prefix` as stale.
  ///
  /// Fetches in flight for those entries are detached: their callers still
  /// get the result, but it is not stored, and the next read fetches anew.
  /// Returns the number of entries touched.
  pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
    let mut entries = self.lock();
    let mut count = 0;
    for (key, entry) in entries.iter_mut() {
      if key.starts_with(prefix) {
        entry.invalidated = true;
        entry.in_flight = None;
        count += 1;
      }
    }
    debug!(%prefix, count, "invalidated queries");
    count
  }

  /// Seed or overwrite the cached value of `key`.
  pub fn set_query_data<T>(&self, key: &QueryKey, data: T)
  where
    T: Send + Sync + 'static,
  {
    let mut entries = self.lock();
    let now = Utc::now();
    let entry = entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(now));
    entry.value = Some(CachedValue {
      value: Arc::new(data),
      fetched_at: now,
    });
    entry.invalidated = false;
    entry.last_used = now;
  }

  /// Cached value of `key`, fresh or not.
  pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<T>
  where
    T: Clone + 'static,
  {
    let entries = self.lock();
    entries
      .get(key)
      .and_then(|entry| entry.value.as_ref())
      .and_then(|cached| cached.value.downcast_ref::<T>().cloned())
  }

  /// Whether a fetch for `key` is currently in flight.
  pub fn is_fetching(&self, key: &QueryKey) -> bool {
    let entries = self.lock();
    entries
      .get(key)
      .is_some_and(|entry| entry.in_flight.is_some())
  }

  /// Drop every entry covered by `prefix`.
  pub fn remove_queries(&self, prefix: &QueryKey) {
    self.lock().retain(|key, _| !key.starts_with(prefix));
  }

  /// Drop everything, e.g. when the signed-in user changes.
  pub fn clear(&self) {
    self.lock().clear();
  }

  /// Number of cached keys.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Remove entries that have been idle for at least `gc_time`.
  ///
  /// An entry whose fetch was abandoned by all of its callers is idle too.
  /// If such a fetch still completes for a waiter, its result is returned
  /// but not stored.
  pub fn collect_garbage(&self) {
    let now = Utc::now();
    let gc_time = self.gc_time;
    let mut entries = self.lock();
    let before = entries.len();
    entries.retain(|_, entry| now - entry.last_used < gc_time);
    let removed = before - entries.len();
    if removed > 0 {
      debug!(removed, "collected idle cache entries");
    }
  }
}

impl Clone for QueryClient {
  fn clone(&self) -> Self {
    Self {
      entries: Arc::clone(&self.entries),
      next_fetch_id: Arc::clone(&self.next_fetch_id),
      stale_time: self.stale_time,
      gc_time: self.gc_time,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicU32;
  use std::time::Duration as StdDuration;

  fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
  }

  /// Fetcher returning how many times it has been called.
  fn counting(
    calls: &Arc<AtomicU32>,
    delay: StdDuration,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, ApiError>> {
    let calls = Arc::clone(calls);
    move || {
      async move {
        tokio::time::sleep(delay).await;
        Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
      }
      .boxed()
    }
  }

  fn products() -> QueryKey {
    QueryKey::new("products")
  }

  #[tokio::test]
  async fn test_fresh_value_is_served_from_cache() {
    let client = QueryClient::new();
    let calls = counter();
    let key = products().id(1);

    let first = client
      .fetch_query(&key, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap();
    assert!(!first.is_cached());

    let second = client
      .fetch_query(&key, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap();
    assert!(second.is_cached());
    assert_eq!(second.data, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_stale_value_is_refetched() {
    let client = QueryClient::new().with_stale_time(Duration::zero());
    let calls = counter();
    let key = products().id(1);

    client
      .fetch_query(&key, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap();
    let again = client
      .fetch_query(&key, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap();

    assert_eq!(again.data, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_fetch() {
    let client = QueryClient::new();
    let calls = counter();
    let key = products().id(7);

    let (a, b, c) = tokio::join!(
      client.fetch_query(&key, counting(&calls, StdDuration::from_millis(50))),
      client.fetch_query(&key, counting(&calls, StdDuration::from_millis(50))),
      client.fetch_query(&key, counting(&calls, StdDuration::from_millis(50))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().data, 1);
    assert_eq!(b.unwrap().data, 1);
    assert_eq!(c.unwrap().data, 1);
    assert!(!client.is_fetching(&key));
  }

  #[tokio::test]
  async fn test_different_keys_fetch_independently() {
    let client = QueryClient::new();
    let calls = counter();
    let (k1, k2) = (products().id(1), products().id(2));

    let (a, b) = tokio::join!(
      client.fetch_query(&k1, counting(&calls, StdDuration::from_millis(10))),
      client.fetch_query(&k2, counting(&calls, StdDuration::from_millis(10))),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_errors_reach_all_waiters_and_are_not_cached() {
    let client = QueryClient::new();
    let key = products().id(3);

    let failing = || async {
      tokio::time::sleep(StdDuration::from_millis(20)).await;
      Err::<u32, _>(ApiError::Network("connection refused".to_string()))
    };
    let (a, b) = tokio::join!(
      client.fetch_query(&key, failing),
      client.fetch_query(&key, failing),
    );
    assert!(matches!(a, Err(ApiError::Network(_))));
    assert!(matches!(b, Err(ApiError::Network(_))));
    assert_eq!(client.get_query_data::<u32>(&key), None);

    let ok = client
      .fetch_query(&key, || async { Ok::<_, ApiError>(5u32) })
      .await
      .unwrap();
    assert_eq!(ok.data, 5);
    assert!(!ok.is_cached());
  }

  #[tokio::test]
  async fn test_invalidation_covers_prefixed_keys() {
    let client = QueryClient::new();
    let calls = counter();
    let item = products().id(1);
    let page = products().params([("limit", "10")]);
    let me = QueryKey::new("auth").name("me");

    for key in [&item, &page, &me] {
      client
        .fetch_query(key, counting(&calls, StdDuration::ZERO))
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    assert_eq!(client.invalidate_queries(&products()), 2);

    assert!(!client
      .fetch_query(&item, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap()
      .is_cached());
    assert!(!client
      .fetch_query(&page, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap()
      .is_cached());
    assert!(client
      .fetch_query(&me, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap()
      .is_cached());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
  }

  #[tokio::test]
  async fn test_invalidation_detaches_in_flight_fetch() {
    let client = QueryClient::new();
    let key = products().id(9);

    let slow = {
      let client = client.clone();
      let key = key.clone();
      tokio::spawn(async move {
        client
          .fetch_query(&key, || async {
            tokio::time::sleep(StdDuration::from_millis(100)).await;
            Ok::<_, ApiError>("before")
          })
          .await
      })
    };
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert!(client.is_fetching(&key));

    client.invalidate_queries(&key);
    let fresh = client
      .fetch_query(&key, || async { Ok::<_, ApiError>("after") })
      .await
      .unwrap();
    assert_eq!(fresh.data, "after");

    // The detached fetch still answers its own caller but is not stored
    assert_eq!(slow.await.unwrap().unwrap().data, "before");
    assert_eq!(client.get_query_data::<&str>(&key), Some("after"));
  }

  #[tokio::test]
  async fn test_mutate_invalidates_only_on_success() {
    let client = QueryClient::new();
    let key = products().id(1);
    client.set_query_data(&key, 1u32);

    let failed = client
      .mutate(&[products()], async {
        Err::<(), _>(ApiError::Network("down".to_string()))
      })
      .await;
    assert!(failed.is_err());
    let cached = client
      .fetch_query(&key, || async { Ok::<_, ApiError>(2u32) })
      .await
      .unwrap();
    assert!(cached.is_cached());
    assert_eq!(cached.data, 1);

    let updated = client
      .mutate(&[products(), key.clone()], async { Ok::<_, ApiError>("ok") })
      .await
      .unwrap();
    assert_eq!(updated, "ok");
    let refetched = client
      .fetch_query(&key, || async { Ok::<_, ApiError>(2u32) })
      .await
      .unwrap();
    assert!(!refetched.is_cached());
    assert_eq!(refetched.data, 2);
  }

  #[tokio::test]
  async fn test_disabled_query_never_fetches() {
    let client = QueryClient::new();
    let calls = counter();

    let result = client
      .fetch_query_enabled(&products().id(0), false, counting(&calls, StdDuration::ZERO))
      .await
      .unwrap();
    assert!(result.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_idle_entries_are_collected() {
    let client = QueryClient::new().with_gc_time(Duration::zero());
    client
      .fetch_query(&products().id(1), || async { Ok::<_, ApiError>(1u32) })
      .await
      .unwrap();
    assert_eq!(client.len(), 1);

    client.collect_garbage();
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_abandoned_fetch_is_collected() {
    let client = QueryClient::new().with_gc_time(Duration::milliseconds(50));
    let calls = counter();
    let key = products().id(4);

    let timed_out = tokio::time::timeout(
      StdDuration::from_millis(10),
      client.fetch_query(&key, counting(&calls, StdDuration::from_secs(5))),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(client.is_fetching(&key));

    tokio::time::sleep(StdDuration::from_millis(60)).await;
    client.collect_garbage();
    assert!(client.is_empty());

    // The next read starts over instead of joining the abandoned fetch
    let fresh = client
      .fetch_query(&key, || async { Ok::<_, ApiError>(7u32) })
      .await
      .unwrap();
    assert_eq!(fresh.data, 7);
  }

  #[test]
  fn test_remove_and_clear() {
    let client = QueryClient::new();
    client.set_query_data(&products().id(1), 1u32);
    client.set_query_data(&QueryKey::new("auth").name("me"), 2u32);

    client.remove_queries(&products());
    assert_eq!(client.get_query_data::<u32>(&products().id(1)), None);
    assert_eq!(client.len(), 1);

    client.clear();
    assert!(client.is_empty());
  }
}
