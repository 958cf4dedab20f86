// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory register cache with TTL.
//!
//! One process-wide table keyed by `device_id:register_type:address:count`.
//! Expiry is lazy: an expired entry found by `get` counts as an eviction
//! and a miss. A periodic [`RegisterCache::sweep_expired`] pass is cheap and
//! optional; the poller runs one per cycle.
//!
//! Values are stored as `Vec<u16>`; bit spaces are represented as 0/1 so
//! cache entries and MQTT payloads stay homogeneous.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::types::{DeviceId, RegisterType};

// =============================================================================
// CacheEntry
// =============================================================================

/// One cached read result.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Device the values belong to.
    pub device_id: DeviceId,
    /// Register space that was read.
    pub register_type: RegisterType,
    /// Start address of the range.
    pub address: u16,
    /// Number of items in the range.
    pub count: u16,
    /// The values, bit spaces as 0/1.
    pub values: Vec<u16>,
    /// When the values were read.
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Composite cache key for this entry.
    pub fn key(&self) -> String {
        cache_key(&self.device_id, self.register_type, self.address, self.count)
    }

    /// Age of the entry relative to now.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.cached_at).to_std().unwrap_or(Duration::ZERO)
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    /// Returns `true` if the entry's range overlaps `[address, address+count)`
    /// in the same register space.
    pub fn overlaps(&self, register_type: RegisterType, address: u16, count: u16) -> bool {
        if self.register_type != register_type {
            return false;
        }
        let own_start = u32::from(self.address);
        let own_end = own_start + u32::from(self.count);
        let other_start = u32::from(address);
        let other_end = other_start + u32::from(count);
        own_start < other_end && other_start < own_end
    }
}

/// Builds the composite key `device_id:register_type:address:count`.
pub fn cache_key(device_id: &DeviceId, register_type: RegisterType, address: u16, count: u16) -> String {
    format!("{}:{}:{}:{}", device_id, register_type, address, count)
}

// =============================================================================
// RegisterCache
// =============================================================================

/// Process-wide register cache.
pub struct RegisterCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
}

impl RegisterCache {
    /// Creates a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Looks up a cached range.
    ///
    /// An expired entry is removed, counted as an eviction, and reported as
    /// a miss.
    pub fn get(
        &self,
        device_id: &DeviceId,
        register_type: RegisterType,
        address: u16,
        count: u16,
    ) -> Option<CacheEntry> {
        let key = cache_key(device_id, register_type, address, count);

        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired(self.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.clone());
            }
        }

        // Expired entries are dropped outside the read guard.
        if let Some((_, entry)) = self.entries.remove(&key) {
            if entry.is_expired(self.ttl) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                // Raced with a concurrent set; put the fresh entry back.
                self.entries.insert(key, entry.clone());
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Upserts a range, stamping `cached_at = now`.
    pub fn set(
        &self,
        device_id: DeviceId,
        register_type: RegisterType,
        address: u16,
        count: u16,
        values: Vec<u16>,
    ) {
        let entry = CacheEntry {
            device_id,
            register_type,
            address,
            count,
            values,
            cached_at: Utc::now(),
        };
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(entry.key(), entry);
    }

    /// Removes one exact range. Returns `true` if an entry existed.
    pub fn invalidate(
        &self,
        device_id: &DeviceId,
        register_type: RegisterType,
        address: u16,
        count: u16,
    ) -> bool {
        self.entries
            .remove(&cache_key(device_id, register_type, address, count))
            .is_some()
    }

    /// Removes every entry of `device_id`/`register_type` overlapping
    /// `[address, address+count)`. Returns the number removed.
    pub fn invalidate_overlapping(
        &self,
        device_id: &DeviceId,
        register_type: RegisterType,
        address: u16,
        count: u16,
    ) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| {
                e.value().device_id == *device_id
                    && e.value().overlaps(register_type, address, count)
            })
            .map(|e| e.key().clone())
            .collect();
        let removed = keys.len();
        for key in keys {
            self.entries.remove(&key);
        }
        removed
    }

    /// Clears the cache. Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Drops all expired entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(self.ttl));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Snapshot of all live (non-expired) entries.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(self.ttl))
            .map(|e| e.value().clone())
            .collect()
    }

    /// Snapshot of the live entries for one device.
    pub fn device_entries(&self, device_id: &DeviceId) -> Vec<CacheEntry> {
        self.entries
            .iter()
            .filter(|e| e.value().device_id == *device_id && !e.value().is_expired(self.ttl))
            .map(|e| e.value().clone())
            .collect()
    }

    /// All live cache keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(self.ttl))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries: self.entries.len(),
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate_percent: if total == 0 {
                0.0
            } else {
                (hits as f64 / total as f64) * 100.0
            },
        }
    }

    /// Resets the hit/miss/set/eviction counters (entries are kept).
    pub fn reset_counters(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for RegisterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

// =============================================================================
// CacheStats
// =============================================================================

/// Cache counter snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Number of stored entries (including not-yet-swept expired ones).
    pub entries: usize,
    /// Lookup hits.
    pub hits: u64,
    /// Lookup misses (including expired hits).
    pub misses: u64,
    /// Upserts.
    pub sets: u64,
    /// Entries dropped because they expired.
    pub evictions: u64,
    /// `hits / (hits + misses)` in percent.
    pub hit_rate_percent: f64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("plc-001")
    }

    #[test]
    fn set_then_get() {
        let cache = RegisterCache::new(Duration::from_secs(300));
        cache.set(device(), RegisterType::Holding, 0, 5, vec![1, 2, 3, 4, 5]);

        let entry = cache.get(&device(), RegisterType::Holding, 0, 5).unwrap();
        assert_eq!(entry.values, vec![1, 2, 3, 4, 5]);
        assert_eq!(entry.key(), "plc-001:holding:0:5");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.sets, 1);
    }

    #[test]
    fn miss_on_absent_key() {
        let cache = RegisterCache::new(Duration::from_secs(300));
        assert!(cache.get(&device(), RegisterType::Holding, 0, 5).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn different_count_is_a_different_key() {
        let cache = RegisterCache::new(Duration::from_secs(300));
        cache.set(device(), RegisterType::Holding, 0, 5, vec![0; 5]);
        assert!(cache.get(&device(), RegisterType::Holding, 0, 4).is_none());
    }

    #[tokio::test]
    async fn expired_entry_counts_as_eviction_and_miss() {
        let cache = RegisterCache::new(Duration::from_millis(10));
        cache.set(device(), RegisterType::Holding, 0, 1, vec![7]);

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get(&device(), RegisterType::Holding, 0, 1).is_none());
        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn last_writer_wins_and_timestamp_advances() {
        let cache = RegisterCache::new(Duration::from_secs(300));
        cache.set(device(), RegisterType::Holding, 0, 1, vec![1]);
        let first = cache.get(&device(), RegisterType::Holding, 0, 1).unwrap();

        cache.set(device(), RegisterType::Holding, 0, 1, vec![2]);
        let second = cache.get(&device(), RegisterType::Holding, 0, 1).unwrap();

        assert_eq!(second.values, vec![2]);
        assert!(second.cached_at >= first.cached_at);
    }

    #[test]
    fn invalidate_overlapping_respects_space_and_range() {
        let cache = RegisterCache::new(Duration::from_secs(300));
        cache.set(device(), RegisterType::Holding, 10, 1, vec![7]);
        cache.set(device(), RegisterType::Holding, 0, 5, vec![0; 5]);
        cache.set(device(), RegisterType::Coil, 10, 1, vec![1]);
        cache.set(DeviceId::new("other"), RegisterType::Holding, 10, 1, vec![9]);

        let removed = cache.invalidate_overlapping(&device(), RegisterType::Holding, 10, 1);
        assert_eq!(removed, 1);

        assert!(cache.get(&device(), RegisterType::Holding, 10, 1).is_none());
        assert!(cache.get(&device(), RegisterType::Holding, 0, 5).is_some());
        assert!(cache.get(&device(), RegisterType::Coil, 10, 1).is_some());
        assert!(cache
            .get(&DeviceId::new("other"), RegisterType::Holding, 10, 1)
            .is_some());
    }

    #[test]
    fn overlap_detection() {
        let entry = CacheEntry {
            device_id: device(),
            register_type: RegisterType::Holding,
            address: 10,
            count: 5,
            values: vec![0; 5],
            cached_at: Utc::now(),
        };
        assert!(entry.overlaps(RegisterType::Holding, 14, 1));
        assert!(entry.overlaps(RegisterType::Holding, 8, 3));
        assert!(!entry.overlaps(RegisterType::Holding, 15, 1));
        assert!(!entry.overlaps(RegisterType::Holding, 5, 5));
        assert!(!entry.overlaps(RegisterType::Input, 10, 5));
    }

    #[tokio::test]
    async fn sweep_drops_only_expired() {
        let cache = RegisterCache::new(Duration::from_millis(20));
        cache.set(device(), RegisterType::Holding, 0, 1, vec![1]);

        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.set(device(), RegisterType::Holding, 1, 1, vec![2]);

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn clear_reports_count() {
        let cache = RegisterCache::new(Duration::from_secs(300));
        cache.set(device(), RegisterType::Holding, 0, 1, vec![1]);
        cache.set(device(), RegisterType::Input, 0, 1, vec![2]);
        assert_eq!(cache.clear(), 2);
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn device_entries_filters() {
        let cache = RegisterCache::new(Duration::from_secs(300));
        cache.set(device(), RegisterType::Holding, 0, 1, vec![1]);
        cache.set(DeviceId::new("other"), RegisterType::Holding, 0, 1, vec![2]);

        let entries = cache.device_entries(&device());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].device_id, device());
    }
}
