use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::StockInfo;
use crate::services::fetcher::FetchedHistory;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe in-process cache with per-entry TTL. Entries are pure derived
/// data; there is no invalidation beyond expiry.
#[derive(Clone)]
pub struct TtlCache<V: Clone> {
    entries: Arc<DashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Returns the cached value if present and not expired. Expired entries
    /// are removed on access.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.value.clone());
            }
            drop(entry); // release the read lock before removing
            self.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: &str, value: V, ttl_secs: u64) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.entries.insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two fetcher caches: raw (history, profile) fetch results and the
/// normalized per-ticker info records. Their lifetimes differ, so they are
/// kept apart.
#[derive(Clone)]
pub struct MarketCache {
    pub history: TtlCache<FetchedHistory>,
    pub info: TtlCache<StockInfo>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self {
            history: TtlCache::new(),
            info: TtlCache::new(),
        }
    }
}

impl Default for MarketCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_retrieves_within_ttl() {
        let cache: TtlCache<String> = TtlCache::new();
        cache.set("stock_data_AAPL_1y", "payload".to_string(), 60);

        assert_eq!(
            cache.get("stock_data_AAPL_1y"),
            Some("payload".to_string())
        );
    }

    #[test]
    fn expired_entries_are_dropped_on_access() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.set("k", 1, 0);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.set("k", 1, 60);
        cache.set("k", 2, 60);

        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_are_independent() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.set("stock_info_AAPL", 1, 60);

        assert_eq!(cache.get("stock_info_MSFT"), None);
    }
}
