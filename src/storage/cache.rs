// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Snapshot cache for unfiltered wallet holdings.
//!
//! The holdings pipeline is expensive (full-history log scans plus one
//! `eth_call` per contract). A [`SnapshotCache`] lets repeated requests for
//! the same wallet reuse the last unfiltered snapshot for a short TTL.
//! Visibility filtering and totals are never cached.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Cache of per-wallet snapshots keyed by lowercase address.
pub trait SnapshotCache<V>: Send + Sync {
    /// Get the snapshot for a wallet. Returns `None` if not cached or expired.
    fn get(&self, wallet_address: &str) -> Option<V>;

    /// Store the snapshot for a wallet.
    fn put(&self, wallet_address: &str, value: V);

    /// Drop the snapshot for a wallet.
    fn invalidate(&self, wallet_address: &str);
}

/// Cache that never stores anything (TTL 0).
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

impl<V> SnapshotCache<V> for DisabledCache {
    fn get(&self, _wallet_address: &str) -> Option<V> {
        None
    }

    fn put(&self, _wallet_address: &str, _value: V) {}

    fn invalidate(&self, _wallet_address: &str) {}
}

/// Cached entry: snapshot + insertion timestamp.
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-process LRU cache with a per-entry TTL.
pub struct LruTtlCache<V> {
    cache: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V> LruTtlCache<V> {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// - `capacity`: Max number of wallet addresses to cache (at least 1).
    /// - `ttl`: Time-to-live for each cache entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }
}

impl<V: Clone + Send> SnapshotCache<V> for LruTtlCache<V> {
    fn get(&self, wallet_address: &str) -> Option<V> {
        let key = wallet_address.to_lowercase();
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            // Expired, remove it
            cache.pop(&key);
        }
        None
    }

    fn put(&self, wallet_address: &str, value: V) {
        let key = wallet_address.to_lowercase();
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                key,
                CacheEntry {
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    fn invalidate(&self, wallet_address: &str) {
        let key = wallet_address.to_lowercase();
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(&key);
        }
    }
}

/// Build the cache selected by configuration: disabled when `ttl` is zero.
pub fn snapshot_cache<V>(capacity: usize, ttl: Duration) -> Box<dyn SnapshotCache<V>>
where
    V: Clone + Send + 'static,
{
    if ttl.is_zero() {
        Box::new(DisabledCache)
    } else {
        Box::new(LruTtlCache::new(capacity, ttl))
    }
}
