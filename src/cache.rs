use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::debug;

use crate::error::Result;
use crate::metrics::{CACHE_COALESCED, CACHE_HITS, CACHE_MISSES, CACHE_SIZE};

// Cached response body with its expiry
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub response: String,
    /// Request path the entry belongs to, used for invalidation.
    pub scope: String,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// One fetch shared by every caller that misses on the same key
#[derive(Clone)]
struct Pending {
    id: u64,
    scope: String,
    /// Generation when the fetch started.
    generation: u64,
    fetch: Shared<BoxFuture<'static, Result<String>>>,
}

/// TTL cache of raw response bodies keyed by request fingerprint.
///
/// Concurrent misses for one key share a single fetch. The fetch is owned by
/// the cache, not by the caller that started it: if that caller is dropped,
/// the remaining waiters (or the next caller for the key) pick up the same
/// fetch instead of starting another one.
///
/// Every invalidation bumps a generation counter. A fetch that started before
/// an invalidation still answers its own waiters but is never stored, and
/// callers arriving after the invalidation start a fresh fetch.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    in_flight: DashMap<String, Pending>,
    generation: AtomicU64,
    next_fetch_id: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired body for `key`. Expired entries are removed on the way.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.response.clone());
            }
        }
        if self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            CACHE_SIZE.set(self.entries.len() as f64);
        }
        None
    }

    pub fn insert(&self, key: &str, scope: &str, response: String, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                response,
                scope: scope.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    /// Cached body for `key`, or the result of `fetch`. Only successes are stored.
    ///
    /// `fetch` is called at most once per miss and its future keeps running
    /// when the calling task goes away.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        scope: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        if let Some(hit) = self.lookup(key) {
            CACHE_HITS.inc();
            debug!(key, scope, "cache hit");
            return Ok(hit);
        }

        let pending = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(joined) => {
                CACHE_COALESCED.inc();
                debug!(key, scope, "joined in-flight fetch");
                joined.get().clone()
            }
            Entry::Vacant(slot) => {
                // a fetch may have finished between our lookup and this point
                if let Some(hit) = self.lookup(key) {
                    CACHE_HITS.inc();
                    return Ok(hit);
                }
                CACHE_MISSES.inc();
                debug!(key, scope, "cache miss");
                let pending = Pending {
                    id: self.next_fetch_id.fetch_add(1, Ordering::Relaxed),
                    scope: scope.to_string(),
                    generation: self.generation.load(Ordering::SeqCst),
                    fetch: fetch().boxed().shared(),
                };
                slot.insert(pending.clone());
                pending
            }
        };

        let result = pending.fetch.clone().await;
        if let Ok(body) = &result {
            self.store_if_current(key, &pending, body, ttl);
        }
        self.in_flight.remove_if(key, |_, p| p.id == pending.id);

        result
    }

    // Store a fetched body unless an invalidation happened since the fetch
    // started. The second check covers an invalidation racing the insert.
    fn store_if_current(&self, key: &str, pending: &Pending, body: &str, ttl: Duration) {
        if self.generation.load(Ordering::SeqCst) != pending.generation {
            debug!(key, scope = %pending.scope, "discarding response fetched before invalidation");
            return;
        }
        self.insert(key, &pending.scope, body.to_string(), ttl);
        if self.generation.load(Ordering::SeqCst) != pending.generation {
            self.entries.remove(key);
            CACHE_SIZE.set(self.entries.len() as f64);
        }
    }

    /// Drop every entry and in-flight fetch whose scope starts with `prefix`.
    /// Fetches already under way are not stored when they finish.
    pub fn invalidate_scope(&self, prefix: &str) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.in_flight.retain(|_, p| !p.scope.starts_with(prefix));

        let before = self.entries.len();
        self.entries.retain(|_, e| !e.scope.starts_with(prefix));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(prefix, removed, "invalidated cached reads");
        }
        CACHE_SIZE.set(self.entries.len() as f64);
        removed
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        CACHE_SIZE.set(self.entries.len() as f64);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.in_flight.clear();
        self.entries.clear();
        CACHE_SIZE.set(0.0);
    }
}

// Cache key: hash of method + path + body
pub fn make_cache_key(method: &str, path: &str, body: Option<&serde_json::Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    if let Some(body) = body {
        hasher.update(body.to_string().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

// Periodic sweep of expired entries
pub fn spawn_sweeper(cache: Arc<ResponseCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        debug!("cache sweeper started (interval: {:?})", every);
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(removed, "swept expired cache entries");
            }
        }
    })
}
