//! In-memory cache for file responses.
//!
//! Copy-on-read: entries hand out cheap `Bytes` clones, never references
//! into the map. An atomic byte counter tracks residency; when it passes
//! the cap, a single holder of the eviction mutex scans a bounded slice
//! of the map and drops roughly the oldest tenth of what it scanned.

use ahash::AHashMap;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

const SCAN_LIMIT: usize = 128;

struct CacheEntry {
    data: Bytes,
    content_type: String,
    stamp: AtomicU64,
}

pub(crate) struct FileCache {
    entries: RwLock<AHashMap<String, CacheEntry>>,
    bytes: AtomicUsize,
    evicting: Mutex<()>,
    clock: AtomicU64,
    cap: usize,
}

impl FileCache {
    pub(crate) fn new(cap: usize) -> Self {
        FileCache {
            entries: RwLock::new(AHashMap::new()),
            bytes: AtomicUsize::new(0),
            evicting: Mutex::new(()),
            clock: AtomicU64::new(0),
            cap,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<(Bytes, String)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        entry
            .stamp
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
        Some((entry.data.clone(), entry.content_type.clone()))
    }

    pub(crate) fn insert(&self, key: &str, data: Bytes, content_type: &str) {
        if data.len() > self.cap {
            return;
        }
        let added = data.len();
        let replaced = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            entries
                .insert(
                    key.to_string(),
                    CacheEntry {
                        data,
                        content_type: content_type.to_string(),
                        stamp: AtomicU64::new(self.clock.fetch_add(1, Ordering::Relaxed)),
                    },
                )
                .map(|old| old.data.len())
                .unwrap_or(0)
        };
        let total = self.bytes.fetch_add(added, Ordering::Relaxed) + added;
        if replaced > 0 {
            self.bytes.fetch_sub(replaced, Ordering::Relaxed);
        }
        if total.saturating_sub(replaced) > self.cap {
            self.evict();
        }
    }

    /// Resident bytes, approximate under concurrency.
    pub(crate) fn resident_bytes(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }

    fn evict(&self) {
        // one evictor at a time; everyone else keeps serving
        let Ok(_guard) = self.evicting.try_lock() else {
            return;
        };
        while self.bytes.load(Ordering::Relaxed) > self.cap {
            let victims: Vec<String> = {
                let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
                if entries.is_empty() {
                    break;
                }
                let mut scanned: Vec<(&String, u64)> = entries
                    .iter()
                    .take(SCAN_LIMIT)
                    .map(|(key, entry)| (key, entry.stamp.load(Ordering::Relaxed)))
                    .collect();
                scanned.sort_by_key(|(_, stamp)| *stamp);
                let take = (scanned.len() / 10).max(1);
                scanned
                    .into_iter()
                    .take(take)
                    .map(|(key, _)| key.clone())
                    .collect()
            };
            if victims.is_empty() {
                break;
            }
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            for key in victims {
                if let Some(old) = entries.remove(&key) {
                    self.bytes.fetch_sub(old.data.len(), Ordering::Relaxed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_on_read_returns_clones() {
        let cache = FileCache::new(1024);
        cache.insert("a", Bytes::from_static(b"hello"), "text/plain");
        let (first, ct) = cache.get("a").unwrap();
        let (second, _) = cache.get("a").unwrap();
        assert_eq!(first, second);
        assert_eq!(ct, "text/plain");
    }

    #[test]
    fn eviction_brings_residency_under_cap() {
        let cache = FileCache::new(100);
        for i in 0..30 {
            cache.insert(&format!("f{}", i), Bytes::from(vec![0u8; 10]), "a/b");
        }
        assert!(cache.resident_bytes() <= 100);
    }

    #[test]
    fn oversized_entries_are_not_cached() {
        let cache = FileCache::new(10);
        cache.insert("big", Bytes::from(vec![0u8; 11]), "a/b");
        assert!(cache.get("big").is_none());
    }
}
