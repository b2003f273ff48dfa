//! No-op [`KvStore`] implementation, selecting the server's in-memory mode.
//!
//! Grounded directly in the teacher's `storage/datastores/null.rs`
//! `NullDataStore`: every method a trivial `Ok`, `is_null() -> true`.

use std::time::Duration;

use async_trait::async_trait;

use super::KvStore;

/// No-op `KvStore` used when no `etcdEndpoints` are configured.
pub struct NullKvStore;

#[async_trait]
impl KvStore for NullKvStore {
    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_prefix(&self, _prefix: &str) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn status(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_null(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_returns_ok() {
        let store = NullKvStore;
        assert!(store
            .put("k", vec![1, 2, 3], Duration::from_secs(30))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn get_prefix_returns_empty() {
        let store = NullKvStore;
        let result = store.get_prefix("/services/").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn delete_returns_ok() {
        let store = NullKvStore;
        assert!(store.delete("k").await.is_ok());
    }

    #[tokio::test]
    async fn status_always_succeeds() {
        let store = NullKvStore;
        assert!(store.status().await.is_ok());
    }

    #[test]
    fn is_null_returns_true() {
        assert!(NullKvStore.is_null());
    }
}
