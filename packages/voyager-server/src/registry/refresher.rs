//! Store-backed-mode cache refresher.
//!
//! Wakes every `cache_ttl / 2`, re-fetches the full `/services/` prefix from
//! the external store within a 10-second deadline, and merges the snapshot
//! into the `ServiceMap` via [`RegistryCore::merge_snapshot`]'s
//! generation-tagged rule, so a Register/HealthCheck racing the refresh is
//! never clobbered by a stale snapshot (spec.md §4.2, §9). Cooperative
//! cancellation via `tokio::sync::watch`, grounded in the teacher's
//! `ShutdownController::shutdown_receiver()` pattern (`network/shutdown.rs`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use voyager_core::Registration;

use super::{InstanceInfo, RegistryCore};
use crate::kv::SERVICE_KEY_PREFIX;
use crate::metrics;

const REFRESH_DEADLINE: Duration = Duration::from_secs(10);

/// Periodic refresher started only in store-backed mode (spec.md §4.2).
pub struct CacheRefresher {
    registry: Arc<RegistryCore>,
    period: Duration,
}

impl CacheRefresher {
    #[must_use]
    pub fn new(registry: Arc<RegistryCore>) -> Self {
        let period = registry.cache_ttl() / 2;
        Self { registry, period }
    }

    /// Runs the refresh loop until `shutdown` fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_once().await;
                }
                _ = shutdown.changed() => {
                    info!("cache refresher stopping on shutdown signal");
                    return;
                }
            }
        }
    }

    async fn refresh_once(&self) {
        metrics::record_refresh_attempt();
        let refresh_generation = self.registry.next_generation();

        let fetch = self.registry.store().get_prefix(SERVICE_KEY_PREFIX);
        let entries = match tokio::time::timeout(REFRESH_DEADLINE, fetch).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(err)) => {
                metrics::record_refresh_error();
                warn!(%err, "cache refresh fetch failed, keeping current snapshot");
                return;
            }
            Err(_) => {
                metrics::record_refresh_error();
                warn!("cache refresh timed out, keeping current snapshot");
                return;
            }
        };

        let mut snapshot: HashMap<String, HashMap<String, InstanceInfo>> = HashMap::new();
        let mut skipped = 0;
        let now = Instant::now();

        for (key, bytes) in entries {
            match rmp_serde::from_slice::<Registration>(&bytes) {
                Ok(registration) => {
                    snapshot
                        .entry(registration.service_name.clone())
                        .or_default()
                        .insert(
                            registration.instance_id.clone(),
                            InstanceInfo {
                                registration,
                                last_seen: now,
                                generation: 0,
                            },
                        );
                }
                Err(err) => {
                    skipped += 1;
                    debug!(key, %err, "skipping unparseable record during refresh");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, "cache refresh skipped unparseable records");
        }

        self.registry.merge_snapshot(snapshot, refresh_generation);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use voyager_core::Registration;

    use super::*;
    use crate::kv::KvStore;

    struct FixedStore {
        entries: Vec<(String, Vec<u8>)>,
    }

    #[async_trait]
    impl KvStore for FixedStore {
        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> anyhow::Result<()> {
            Ok(())
        }

        async fn get_prefix(&self, _prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
            Ok(self.entries.clone())
        }

        async fn delete(&self, _key: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn status(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn reg(service: &str, instance: &str) -> Registration {
        Registration {
            service_name: service.to_string(),
            instance_id: instance.to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn refresh_populates_map_from_store() {
        let r = reg("order", "inst-1");
        let bytes = rmp_serde::to_vec_named(&r).unwrap();
        let store = FixedStore {
            entries: vec![(r.store_key(), bytes)],
        };
        let registry = Arc::new(RegistryCore::new(Arc::new(store), Duration::from_secs(30)));

        let refresher = CacheRefresher::new(Arc::clone(&registry));
        refresher.refresh_once().await;

        let list = registry.discover("order", false);
        assert_eq!(list.instances.len(), 1);
        assert_eq!(list.instances[0].instance_id, "inst-1");
    }

    #[tokio::test]
    async fn refresh_skips_unparseable_record_without_failing() {
        let store = FixedStore {
            entries: vec![("/services/order/bad".to_string(), vec![0xFF, 0xFF])],
        };
        let registry = Arc::new(RegistryCore::new(Arc::new(store), Duration::from_secs(30)));

        let refresher = CacheRefresher::new(Arc::clone(&registry));
        refresher.refresh_once().await;

        assert_eq!(registry.instance_count(), 0);
    }

    #[tokio::test]
    async fn refresh_preserves_instance_registered_after_snapshot_capture() {
        let store = FixedStore { entries: vec![] };
        let registry = Arc::new(RegistryCore::new(Arc::new(store), Duration::from_secs(30)));

        // Register happens "during" the refresh window conceptually: its
        // generation will be newer than the snapshot's captured generation.
        registry.register(reg("order", "inst-new")).await.unwrap();

        let refresher = CacheRefresher::new(Arc::clone(&registry));
        refresher.refresh_once().await;

        let list = registry.discover("order", false);
        assert_eq!(list.instances.len(), 1);
        assert_eq!(list.instances[0].instance_id, "inst-new");
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let store = FixedStore { entries: vec![] };
        let registry = Arc::new(RegistryCore::new(Arc::new(store), Duration::from_millis(20)));

        let (tx, rx) = watch::channel(false);
        let refresher = CacheRefresher::new(registry);
        let handle = tokio::spawn(refresher.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("refresher stopped within timeout")
            .unwrap();
    }
}
