//! [`KvStore`] backed by etcd, a Raft-based strongly-consistent store.
//!
//! Each `put` grants a dedicated lease for the TTL and attaches it to the
//! write, giving the expiry semantics spec.md §4.5 requires: absence of a
//! refreshing `put` within `ttl` lets etcd reap the key on its own.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, GetOptions, PutOptions};
use tokio::sync::Mutex;

use super::KvStore;

/// `KvStore` adapter over an `etcd-client` connection.
///
/// The client is wrapped in a `Mutex` because `etcd_client::Client` requires
/// `&mut self` for RPCs; callers already synchronize through the Registry
/// Core's own lock, so this is never a bottleneck on the hot Discover path
/// (which never touches the store at all).
pub struct EtcdKvStore {
    client: Mutex<Client>,
}

impl EtcdKvStore {
    /// Connects to the given etcd endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint can be reached.
    pub async fn connect(endpoints: &[String]) -> anyhow::Result<Self> {
        let client = Client::connect(endpoints, None::<ConnectOptions>).await?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

#[async_trait]
impl KvStore for EtcdKvStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        let ttl_secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
        let lease = client.lease_grant(ttl_secs, None).await?;
        client
            .put(key, value, Some(PutOptions::new().with_lease(lease.id())))
            .await?;
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        let mut client = self.client.lock().await;
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await?;
        Ok(resp
            .kvs()
            .iter()
            .map(|kv| (kv.key_str().unwrap_or_default().to_string(), kv.value().to_vec()))
            .collect())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        client.delete(key, None).await?;
        Ok(())
    }

    async fn status(&self) -> anyhow::Result<()> {
        let mut client = self.client.lock().await;
        client.status().await?;
        Ok(())
    }
}
