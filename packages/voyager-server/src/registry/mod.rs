//! Registry Core: the authoritative `ServiceMap` and its four operations.
//!
//! Holds a two-level `serviceName -> instanceId -> InstanceInfo` mapping
//! behind a single `parking_lot::RwLock`, matching spec.md §4.1's concurrency
//! model exactly: Register/Deregister/HealthCheck take the write lock,
//! Discover takes the read lock, so the sequence of write-lock acquisitions
//! is the externally observable mutation order. Grounded in the teacher's
//! single-authoritative-store-guarded-by-one-lock design (the now-removed
//! `storage/impls/default_record_store.rs`). The external-store write
//! happens before the lock is taken, keeping critical sections short.

pub mod janitor;
pub mod refresher;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::warn;

use voyager_core::{HealthStatus, Registration, ServiceList};

use crate::error::RegistryError;
use crate::kv::{service_store_key, KvStore, SERVICE_KEY_PREFIX};

pub use refresher::CacheRefresher;

/// A stored registration plus the bookkeeping needed for expiry and for the
/// Cache Refresher's generation-tagged merge.
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub registration: Registration,
    pub last_seen: Instant,
    /// Monotonically increasing tag set at Register/HealthCheck time. A Cache
    /// Refresher swap never overwrites an entry whose generation is newer
    /// than the snapshot it is merging in.
    pub generation: u64,
}

type ServiceMap = HashMap<String, HashMap<String, InstanceInfo>>;

/// The authoritative service registry.
pub struct RegistryCore {
    map: RwLock<ServiceMap>,
    store: Arc<dyn KvStore>,
    cache_ttl: Duration,
    generation: AtomicU64,
    in_memory: AtomicBool,
}

impl RegistryCore {
    /// Constructs an empty registry. `store.is_null()` determines whether the
    /// instance behaves as store-backed or in-memory to start -- `bulk_load`
    /// may additionally flip a store-backed instance into in-memory mode if
    /// the initial load fails (spec.md §4.1: "if initial bulk-load from the
    /// store fails, the server falls back to in-memory mode").
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, cache_ttl: Duration) -> Self {
        let in_memory = store.is_null();
        Self {
            map: RwLock::new(HashMap::new()),
            store,
            cache_ttl,
            generation: AtomicU64::new(0),
            in_memory: AtomicBool::new(in_memory),
        }
    }

    #[must_use]
    pub fn in_memory_mode(&self) -> bool {
        self.in_memory.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Bulk-loads the map from the store at startup. On failure, flips this
    /// registry into in-memory mode (spec.md §4.1) rather than merely
    /// reporting the error -- `in_memory_mode()` reflects the fallback from
    /// this point on, so the janitor/refresher selection and the
    /// register/discover/health_check paths all observe it.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial `getPrefix` call fails, after having
    /// already switched the registry to in-memory mode.
    pub async fn bulk_load(&self) -> anyhow::Result<()> {
        if self.in_memory_mode() {
            return Ok(());
        }
        let entries = match self.store.get_prefix(SERVICE_KEY_PREFIX).await {
            Ok(entries) => entries,
            Err(err) => {
                self.in_memory.store(true, Ordering::Release);
                return Err(err);
            }
        };
        let mut map = self.map.write();
        let now = Instant::now();
        for (key, bytes) in entries {
            match rmp_serde::from_slice::<Registration>(&bytes) {
                Ok(reg) => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    map.entry(reg.service_name.clone()).or_default().insert(
                        reg.instance_id.clone(),
                        InstanceInfo {
                            registration: reg,
                            last_seen: now,
                            generation,
                        },
                    );
                }
                Err(err) => warn!(key, %err, "skipping unparseable record during bulk load"),
            }
        }
        Ok(())
    }

    /// Register(reg) -> success or InvalidArgument.
    ///
    /// # Errors
    ///
    /// `RegistryError::InvalidArgument` on a malformed registration,
    /// `RegistryError::Internal` if the store write fails.
    pub async fn register(&self, reg: Registration) -> Result<(), RegistryError> {
        reg.validate()
            .map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;

        if !self.in_memory_mode() {
            let bytes = rmp_serde::to_vec_named(&reg)
                .map_err(|e| RegistryError::Internal(e.to_string()))?;
            let key = service_store_key(&reg.service_name, &reg.instance_id);
            self.store
                .put(&key, bytes, self.cache_ttl)
                .await
                .map_err(|e| RegistryError::Internal(e.to_string()))?;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut map = self.map.write();
        map.entry(reg.service_name.clone()).or_default().insert(
            reg.instance_id.clone(),
            InstanceInfo {
                registration: reg,
                last_seen: Instant::now(),
                generation,
            },
        );
        Ok(())
    }

    /// Discover(query) -> the current instance list for `service_name`, never
    /// touching the external store. `healthy_only` filters to entries whose
    /// lease/heartbeat has not exceeded `cache_ttl` (§9 Open Question:
    /// enforced, not advisory).
    #[must_use]
    pub fn discover(&self, service_name: &str, healthy_only: bool) -> ServiceList {
        let map = self.map.read();
        let Some(instances) = map.get(service_name) else {
            return ServiceList::default();
        };

        let now = Instant::now();
        let instances = instances
            .values()
            .filter(|info| !healthy_only || now.duration_since(info.last_seen) <= self.cache_ttl)
            .map(|info| info.registration.clone())
            .collect();

        ServiceList { instances }
    }

    /// HealthCheck(service_name, instance_id) -> HEALTHY/UNHEALTHY. Unknown
    /// instances are UNHEALTHY, never UNKNOWN (§9 Open Question: UNKNOWN is
    /// reserved, never emitted). Failures to renew the store lease produce
    /// UNHEALTHY but do not delete the entry.
    pub async fn health_check(&self, service_name: &str, instance_id: &str) -> HealthStatus {
        let registration = {
            let map = self.map.read();
            map.get(service_name)
                .and_then(|instances| instances.get(instance_id))
                .map(|info| info.registration.clone())
        };

        let Some(registration) = registration else {
            return HealthStatus::Unhealthy;
        };

        if !self.in_memory_mode() {
            let Ok(bytes) = rmp_serde::to_vec_named(&registration) else {
                return HealthStatus::Unhealthy;
            };
            let key = service_store_key(service_name, instance_id);
            if self.store.put(&key, bytes, self.cache_ttl).await.is_err() {
                return HealthStatus::Unhealthy;
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut map = self.map.write();
        let Some(info) = map
            .get_mut(service_name)
            .and_then(|instances| instances.get_mut(instance_id))
        else {
            return HealthStatus::Unhealthy;
        };
        info.last_seen = Instant::now();
        info.generation = generation;
        HealthStatus::Healthy
    }

    /// Deregister(service_name, instance_id) -> success. Idempotent: an
    /// absent entry is a success.
    ///
    /// # Errors
    ///
    /// `RegistryError::Internal` if the store delete fails.
    pub async fn deregister(
        &self,
        service_name: &str,
        instance_id: &str,
    ) -> Result<(), RegistryError> {
        if !self.in_memory_mode() {
            let key = service_store_key(service_name, instance_id);
            self.store
                .delete(&key)
                .await
                .map_err(|e| RegistryError::Internal(e.to_string()))?;
        }

        let mut map = self.map.write();
        if let Some(instances) = map.get_mut(service_name) {
            instances.remove(instance_id);
            if instances.is_empty() {
                map.remove(service_name);
            }
        }
        Ok(())
    }

    /// Current number of stored instances, across all services. Used by the
    /// `/health` endpoint and the instance-count metrics ticker.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.map.read().values().map(HashMap::len).sum()
    }

    /// Per-service instance counts, for the Metrics Surface's gauges.
    #[must_use]
    pub fn instance_counts_by_service(&self) -> Vec<(String, usize)> {
        self.map
            .read()
            .iter()
            .map(|(name, instances)| (name.clone(), instances.len()))
            .collect()
    }

    /// In-memory-mode sweep: removes every instance whose `last_seen` age
    /// exceeds `cache_ttl`. Called by the [`janitor`] loop; harmless but
    /// unnecessary in store-backed mode, where lease expiry handles it.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        let mut map = self.map.write();
        map.retain(|_, instances| {
            instances.retain(|_, info| {
                let alive = now.duration_since(info.last_seen) <= self.cache_ttl;
                if !alive {
                    removed += 1;
                }
                alive
            });
            !instances.is_empty()
        });
        removed
    }

    /// Merges a freshly-fetched store snapshot into the map. Called only by
    /// the [`CacheRefresher`]; `refresh_generation` is the generation counter
    /// value captured before the snapshot read began. An existing entry
    /// survives the merge if its own generation is newer than the snapshot
    /// (it was registered concurrently with the refresh and is not yet
    /// reflected in it); otherwise the snapshot's view wins, including
    /// dropping entries the snapshot no longer contains.
    pub(crate) fn merge_snapshot(
        &self,
        snapshot: HashMap<String, HashMap<String, InstanceInfo>>,
        refresh_generation: u64,
    ) {
        let mut map = self.map.write();
        let mut merged: ServiceMap = HashMap::new();

        for (service, mut fresh_instances) in snapshot {
            let stale_instances = map.remove(&service).unwrap_or_default();
            for (instance_id, old_info) in stale_instances {
                if old_info.generation > refresh_generation && !fresh_instances.contains_key(&instance_id) {
                    fresh_instances.insert(instance_id, old_info);
                }
            }
            merged.insert(service, fresh_instances);
        }

        // Services the snapshot didn't mention at all survive only if every
        // instance in them is newer than the snapshot.
        for (service, instances) in map.drain() {
            let surviving: HashMap<String, InstanceInfo> = instances
                .into_iter()
                .filter(|(_, info)| info.generation > refresh_generation)
                .collect();
            if !surviving.is_empty() {
                merged.insert(service, surviving);
            }
        }

        *map = merged;
    }

    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub(crate) fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }
}
