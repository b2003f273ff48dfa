//! Per-service discovery cache.
//!
//! A plain `RwLock`-guarded map, mirroring the Registry Core's own
//! reader/writer split (`crate::registry` on the server side): discovery
//! lookups are far more frequent than cache refreshes, so a single
//! exclusive-write/shared-read lock serves both without contention on the
//! hot path.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use voyager_core::ServiceList;

struct CacheEntry {
    list: ServiceList,
    stored_at: Instant,
}

/// Per-service memoization of the last `Discover` response, valid for
/// `ttl` from the time it was stored. Expiry is per-entry; there is no
/// explicit invalidation path.
pub struct DiscoveryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl DiscoveryCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached list for `service_name` if present and not yet
    /// past its TTL.
    #[must_use]
    pub fn get(&self, service_name: &str) -> Option<ServiceList> {
        let entries = self.entries.read();
        let entry = entries.get(service_name)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.list.clone())
    }

    pub fn put(&self, service_name: impl Into<String>, list: ServiceList) {
        self.entries.write().insert(
            service_name.into(),
            CacheEntry {
                list,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every cached entry, regardless of TTL. Used by tests and by a
    /// future explicit-invalidation path; not reachable on the normal
    /// discovery flow today.
    #[cfg(test)]
    fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voyager_core::Registration;

    fn list() -> ServiceList {
        ServiceList {
            instances: vec![Registration {
                service_name: "order".to_string(),
                instance_id: "inst-1".to_string(),
                address: "10.0.0.1".to_string(),
                port: 8080,
                metadata: std::collections::HashMap::new(),
            }],
        }
    }

    #[test]
    fn miss_on_empty_cache() {
        let cache = DiscoveryCache::new(Duration::from_secs(30));
        assert!(cache.get("order").is_none());
    }

    #[test]
    fn hit_returns_the_stored_list() {
        let cache = DiscoveryCache::new(Duration::from_secs(30));
        cache.put("order", list());
        assert_eq!(cache.get("order").unwrap().instances.len(), 1);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = DiscoveryCache::new(Duration::from_millis(1));
        cache.put("order", list());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("order").is_none());
    }

    #[test]
    fn clear_empties_every_entry() {
        let cache = DiscoveryCache::new(Duration::from_secs(30));
        cache.put("order", list());
        cache.clear();
        assert!(cache.get("order").is_none());
    }

    #[test]
    fn put_replaces_the_prior_entry() {
        let cache = DiscoveryCache::new(Duration::from_secs(30));
        cache.put("order", list());
        cache.put("order", ServiceList::default());
        assert_eq!(cache.get("order").unwrap().instances.len(), 0);
    }
}
