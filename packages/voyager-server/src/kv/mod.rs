//! External KV Store Adapter.
//!
//! Abstraction over a strongly-consistent, leased key/value store. The
//! Registry Core depends only on this trait, never on a concrete backend,
//! grounded in the teacher's `Arc<dyn MapDataStore>` indirection
//! (`storage/map_data_store.rs`).

pub mod etcd;
pub mod null;

use std::time::Duration;

use async_trait::async_trait;

pub use etcd::EtcdKvStore;
pub use null::NullKvStore;

/// `/services/` is the only key prefix this system reads or writes.
pub const SERVICE_KEY_PREFIX: &str = voyager_core::SERVICE_KEY_PREFIX;

/// Capability set required of an external key/value store: put-with-TTL-lease,
/// prefix-get, delete, and a connectivity probe.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Writes `value` under `key` with a lease of `ttl`. Absence of any `put`
    /// with the same key within `ttl` causes the key to disappear.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()>;

    /// Returns every key currently stored under `prefix`.
    async fn get_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>>;

    /// Deletes `key`. Absence of the key is not an error.
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Liveness probe used at startup to decide in-memory vs store-backed mode.
    async fn status(&self) -> anyhow::Result<()>;

    /// `true` for the no-op adapter that selects in-memory mode.
    fn is_null(&self) -> bool {
        false
    }
}

#[must_use]
pub fn service_store_key(service_name: &str, instance_id: &str) -> String {
    format!("{SERVICE_KEY_PREFIX}{service_name}/{instance_id}")
}
