//! In-memory-mode expiry sweeper.
//!
//! Wakes every `cache_ttl / 2` and removes instances whose heartbeat has
//! gone stale, since in-memory mode has no external lease to expire them.
//! Cooperative cancellation via `tokio::sync::watch`, grounded in the
//! teacher's `ShutdownController::shutdown_receiver()` pattern
//! (`network/shutdown.rs`).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use super::RegistryCore;

/// Periodic sweeper started only in in-memory mode (spec.md §4.3).
pub struct Janitor {
    registry: Arc<RegistryCore>,
    period: Duration,
}

impl Janitor {
    #[must_use]
    pub fn new(registry: Arc<RegistryCore>) -> Self {
        let period = registry.cache_ttl() / 2;
        Self { registry, period }
    }

    /// Runs the sweep loop until `shutdown` fires. Idempotent by
    /// construction: callers are expected to spawn this exactly once, same
    /// as the teacher's network listeners.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.registry.sweep_expired();
                    if removed > 0 {
                        debug!(removed, "janitor swept expired instances");
                    }
                }
                _ = shutdown.changed() => {
                    info!("janitor stopping on shutdown signal");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use voyager_core::Registration;

    use super::*;
    use crate::kv::NullKvStore;

    fn reg() -> Registration {
        Registration {
            service_name: "order".to_string(),
            instance_id: "inst-1".to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn sweeps_expired_instance_then_stops_on_shutdown() {
        let registry = Arc::new(RegistryCore::new(
            Arc::new(NullKvStore),
            Duration::from_millis(10),
        ));
        registry.register(reg()).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let janitor = Janitor::new(Arc::clone(&registry));
        let handle = tokio::spawn(janitor.run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.instance_count(), 0);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("janitor stopped within timeout")
            .unwrap();
    }
}
