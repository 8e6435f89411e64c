//! Byte-addressable cache in front of the backing store.
//!
//! A size-bounded LRU of object bytes with single-flight fetch semantics:
//! concurrent callers for the same absent key share one in-flight backing
//! fetch instead of issuing duplicates. A NotFound outcome is shared with
//! the callers that were waiting but never cached, so a later request goes
//! back upstream once the object exists.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};

use crate::error::IoError;

use super::object_store::ObjectStore;

/// Default cache capacity: 500MB of object bytes.
pub const DEFAULT_BYTE_CACHE_CAPACITY: usize = 500 * 1024 * 1024;

/// Default maximum number of entries (bounds LRU bookkeeping).
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// State of one in-flight backing fetch, shared between the fetching leader
/// and any waiters that arrived while it ran.
struct InFlightFetch {
    notify: Notify,
    result: Mutex<Option<Result<Bytes, IoError>>>,
}

/// Size-bounded LRU byte cache with single-flight backing fetches.
pub struct ByteCache {
    cache: RwLock<LruCache<String, Bytes>>,
    current_size: RwLock<usize>,
    max_size: usize,
    in_flight: Mutex<HashMap<String, Arc<InFlightFetch>>>,
}

impl ByteCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BYTE_CACHE_CAPACITY)
    }

    /// Create a cache bounded to `max_size` total bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(max_entries.max(1)).unwrap(),
            )),
            current_size: RwLock::new(0),
            max_size,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get the bytes for `key`, fetching from the backing store on a miss.
    ///
    /// At most one backing fetch runs per key; concurrent callers await and
    /// share its outcome, errors included. Only successful fetches are
    /// inserted into the cache.
    pub async fn get(&self, key: &str, store: &dyn ObjectStore) -> Result<Bytes, IoError> {
        loop {
            // Fast path: already cached.
            {
                let mut cache = self.cache.write().await;
                if let Some(data) = cache.get(key) {
                    return Ok(data.clone());
                }
            }

            // Slow path: join an in-flight fetch or become the leader.
            let state = {
                let mut in_flight = self.in_flight.lock().await;
                if let Some(state) = in_flight.get(key) {
                    state.clone()
                } else {
                    let state = Arc::new(InFlightFetch {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(key.to_string(), state.clone());
                    drop(in_flight);

                    let result = store.get(key).await;

                    if let Ok(ref data) = result {
                        self.insert(key.to_string(), data.clone()).await;
                    }
                    {
                        let mut result_guard = state.result.lock().await;
                        *result_guard = Some(result.clone());
                    }
                    {
                        let mut in_flight = self.in_flight.lock().await;
                        in_flight.remove(key);
                    }
                    state.notify.notify_waiters();

                    return result;
                }
            };

            // Register for the notification before re-checking the result so
            // the leader cannot finish in between and leave us waiting.
            let mut notified = pin!(state.notify.notified());
            notified.as_mut().enable();
            if let Some(result) = state.result.lock().await.clone() {
                return result;
            }
            notified.await;

            let cached_result = state.result.lock().await.clone();
            if let Some(result) = cached_result {
                return result;
            }
            // Leader vanished without a result; start over.
        }
    }

    /// Look up `key` without touching the backing store.
    pub async fn get_cached(&self, key: &str) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Insert bytes under `key`, evicting least-recently-used entries until
    /// the cache fits its capacity. Overwriting an existing key is
    /// idempotent with respect to the size accounting.
    pub async fn insert(&self, key: String, data: Bytes) {
        let data_size = data.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old) = cache.peek(&key) {
            *current_size = current_size.saturating_sub(old.len());
        }

        cache.put(key, data);
        *current_size += data_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current_size = current_size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }
    }

    /// Remove `key`, returning the bytes when present.
    pub async fn remove(&self, key: &str) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.pop(key).inspect(|data| {
            *current_size = current_size.saturating_sub(data.len());
        })
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total size of cached bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for ByteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::object_store::test_support::MemoryStore;
    use tokio::time::Duration;

    #[tokio::test]
    async fn test_miss_fetches_then_hit() {
        let store = MemoryStore::new();
        store.insert("a", vec![1u8, 2, 3]);
        let cache = ByteCache::with_capacity(1024);

        let first = cache.get("a", &store).await.unwrap();
        assert_eq!(&first[..], &[1, 2, 3]);
        assert_eq!(store.fetch_count(), 1);

        let second = cache.get("a", &store).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_single_flight_one_fetch_for_concurrent_gets() {
        let store = Arc::new(MemoryStore::with_latency(Duration::from_millis(50)));
        store.insert("slow", vec![7u8; 64]);
        let cache = Arc::new(ByteCache::with_capacity(1024));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                cache.get("slow", store.as_ref()).await
            }));
        }
        for handle in handles {
            let bytes = handle.await.unwrap().unwrap();
            assert_eq!(bytes.len(), 64);
        }

        // All eight callers shared exactly one backing fetch.
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let store = MemoryStore::new();
        let cache = ByteCache::with_capacity(1024);

        let miss = cache.get("ghost", &store).await;
        assert!(matches!(miss, Err(IoError::NotFound(_))));
        assert_eq!(store.fetch_count(), 1);

        // The object appears upstream; the next get succeeds without any
        // manual invalidation.
        store.insert("ghost", vec![9u8]);
        let hit = cache.get("ghost", &store).await.unwrap();
        assert_eq!(&hit[..], &[9]);
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_size_based_eviction() {
        let store = MemoryStore::new();
        store.insert("a", vec![0u8; 400]);
        store.insert("b", vec![0u8; 400]);
        store.insert("c", vec![0u8; 400]);
        let cache = ByteCache::with_capacity_and_entries(1000, 100);

        cache.get("a", &store).await.unwrap();
        cache.get("b", &store).await.unwrap();
        cache.get("c", &store).await.unwrap();

        assert!(cache.size().await <= 1000);
        // "a" was least recently used and got evicted.
        assert!(cache.get_cached("a").await.is_none());
        assert!(cache.get_cached("b").await.is_some());
        assert!(cache.get_cached("c").await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_is_idempotent_for_size() {
        let cache = ByteCache::with_capacity(10_000);
        cache.insert("k".to_string(), Bytes::from(vec![0u8; 1000])).await;
        assert_eq!(cache.size().await, 1000);
        cache.insert("k".to_string(), Bytes::from(vec![0u8; 500])).await;
        assert_eq!(cache.size().await, 500);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = ByteCache::with_capacity(10_000);
        cache.insert("k".to_string(), Bytes::from(vec![1u8, 2])).await;
        let removed = cache.remove("k").await.unwrap();
        assert_eq!(&removed[..], &[1, 2]);
        assert!(cache.is_empty().await);
        assert_eq!(cache.size().await, 0);
        assert!(cache.remove("k").await.is_none());
    }
}
