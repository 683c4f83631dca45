//! Bounded, time-limited store for successful idempotent reads.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

/// Canonical cache key: uppercased method, scheme://host/path, query pairs
/// sorted by name then value, plus an optional caller body fingerprint.
/// Sorting makes the key stable under query-parameter permutation.
pub(crate) fn cache_key(method: &Method, url: &Url, body_fingerprint: Option<&str>) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let host = url.host_str().unwrap_or_default();
    let port = url
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();

    format!(
        "{}|{}://{}{}{}|{}|{}",
        method.as_str().to_uppercase(),
        url.scheme(),
        host,
        port,
        url.path(),
        query,
        body_fingerprint.unwrap_or_default(),
    )
}

#[derive(Debug)]
struct CacheEntry {
    status: u16,
    document: Value,
    inserted_at: Instant,
    last_used: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    tick: u64,
}

/// LRU map with per-entry TTL behind a single async lock. The access
/// pattern is short lock hold times on a small map, so no finer-grained
/// structure is needed.
#[derive(Debug)]
pub(crate) struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    pub(crate) fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            ttl,
            capacity,
        }
    }

    /// Fresh entry for the key, or `None`. Expired entries are removed on
    /// the way out.
    pub(crate) async fn get(&self, key: &str) -> Option<(u16, Value)> {
        let mut inner = self.inner.lock().await;
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.map.get_mut(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                entry.last_used = tick;
                return Some((entry.status, entry.document.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.map.remove(key);
        }
        None
    }

    pub(crate) async fn insert(&self, key: String, status: u16, document: Value) {
        let mut inner = self.inner.lock().await;
        inner.tick += 1;
        let tick = inner.tick;
        inner.map.insert(
            key,
            CacheEntry {
                status,
                document,
                inserted_at: Instant::now(),
                last_used: tick,
            },
        );

        if inner.map.len() > self.capacity {
            let lru = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(lru) = lru {
                inner.map.remove(&lru);
            }
        }
    }

    pub(crate) async fn clear(&self) {
        self.inner.lock().await.map.clear();
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.map.len()
    }
}
