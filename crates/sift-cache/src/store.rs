// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single LRU store with per-read TTL checks.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use sift_core::types::Intent;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// The query an entry was produced for, used by fuzzy matching.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOrigin {
    pub query: String,
    pub intent: Intent,
    pub entity_keys: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub payload: V,
    pub cached_at: Instant,
    /// Owning user; `None` for entries shared across users.
    pub user_id: Option<String>,
    pub origin: Option<EntryOrigin>,
}

impl<V> CacheEntry<V> {
    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }
}

/// Point-in-time counters for one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// LRU store whose entries expire after a TTL supplied at read time.
///
/// The TTL is a read-side argument because it scales with a learned
/// multiplier that may change between insert and lookup.
pub struct TtlLruStore<V> {
    name: &'static str,
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V: Clone> TtlLruStore<V> {
    /// A store holding at most `capacity` entries (minimum 1).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Live entry for `key`, promoting it in LRU order. Expired entries are removed.
    pub async fn get(&self, key: &str, ttl: Duration) -> Option<CacheEntry<V>> {
        let mut entries = self.entries.lock().await;
        let found = entries.get(key).map(|e| (e.age() <= ttl, e.clone()));
        match found {
            Some((true, entry)) => {
                drop(entries);
                self.record_hit();
                Some(entry)
            }
            Some((false, _)) => {
                entries.pop(key);
                drop(entries);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.record_miss();
                None
            }
            None => {
                drop(entries);
                self.record_miss();
                None
            }
        }
    }

    pub async fn insert(&self, entry: CacheEntry<V>) {
        let mut entries = self.entries.lock().await;
        if let Some((evicted_key, _)) = entries.push(entry.key.clone(), entry)
            && !entries.contains(&evicted_key)
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("sift_cache_evictions_total", "store" => self.name).increment(1);
        }
    }

    /// Best live entry by `score`, considering only entries for which it
    /// returns `Some`. Does not change LRU order.
    pub async fn best_match<F>(&self, ttl: Duration, mut score: F) -> Option<(CacheEntry<V>, f64)>
    where
        F: FnMut(&CacheEntry<V>) -> Option<f64>,
    {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|(_, e)| e.age() <= ttl)
            .filter_map(|(_, e)| score(e).map(|s| (e, s)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(e, s)| (e.clone(), s))
    }

    /// Remove every entry owned by `user_id`; returns how many were removed.
    pub async fn remove_user(&self, user_id: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.user_id.as_deref() == Some(user_id))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("sift_cache_hits_total", "store" => self.name).increment(1);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("sift_cache_misses_total", "store" => self.name).increment(1);
    }

    pub async fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.entries.lock().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}
