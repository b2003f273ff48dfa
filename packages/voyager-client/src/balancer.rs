//! Load-balancing policies applied to a fresh instance list.
//!
//! Dynamic strategy selection per §9: a small trait with a single
//! capability, constructed once from configuration and held by the client
//! for its lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use voyager_core::Registration;

use crate::pool::ConnectionPool;

/// Selects one instance from a candidate list, or none if the list is
/// empty. Implementations must be safe for concurrent calls.
pub trait LoadBalancer: Send + Sync {
    fn select(&self, service_name: &str, instances: &[Registration]) -> Option<Registration>;
}

/// Per-service monotonic cursor, modulo the current list length,
/// incremented after each selection. Cursor state survives list changes
/// (e.g. a shrinking list just wraps sooner); overflow is modular via
/// `wrapping_add`.
#[derive(Default)]
pub struct RoundRobin {
    cursors: Mutex<HashMap<String, usize>>,
}

impl RoundRobin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn select(&self, service_name: &str, instances: &[Registration]) -> Option<Registration> {
        if instances.is_empty() {
            return None;
        }
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(service_name.to_string()).or_insert(0);
        let picked = instances[*cursor % instances.len()].clone();
        *cursor = cursor.wrapping_add(1);
        Some(picked)
    }
}

/// Uniform random selection over the candidate list.
#[derive(Default)]
pub struct Random;

impl Random {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn select(&self, _service_name: &str, instances: &[Registration]) -> Option<Registration> {
        if instances.is_empty() {
            return None;
        }
        let mut rng = rand::rng();
        let index = rng.random_range(0..instances.len());
        Some(instances[index].clone())
    }
}

/// Picks the candidate with the fewest open connections in the pool, ties
/// broken by first-seen order (the candidate earliest in the input slice).
pub struct LeastConnections {
    pool: Arc<ConnectionPool>,
}

impl LeastConnections {
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }
}

impl LoadBalancer for LeastConnections {
    fn select(&self, _service_name: &str, instances: &[Registration]) -> Option<Registration> {
        instances
            .iter()
            .min_by_key(|reg| self.pool.connection_count(&reg.socket_addr()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn instances(n: usize) -> Vec<Registration> {
        (0..n)
            .map(|i| Registration {
                service_name: "order".to_string(),
                instance_id: format!("inst-{i}"),
                address: format!("h{i}"),
                port: 80,
                metadata: HashMap::new(),
            })
            .collect()
    }

    #[test]
    fn round_robin_empty_list_returns_none() {
        let lb = RoundRobin::new();
        assert!(lb.select("order", &[]).is_none());
    }

    #[test]
    fn round_robin_cycles_with_period_equal_to_length() {
        let lb = RoundRobin::new();
        let list = instances(3);
        let picks: Vec<_> = (0..4)
            .map(|_| lb.select("order", &list).unwrap().instance_id)
            .collect();
        assert_eq!(picks, vec!["inst-0", "inst-1", "inst-2", "inst-0"]);
    }

    #[test]
    fn round_robin_cursor_is_independent_per_service() {
        let lb = RoundRobin::new();
        let list = instances(2);
        assert_eq!(lb.select("order", &list).unwrap().instance_id, "inst-0");
        assert_eq!(lb.select("pay", &list).unwrap().instance_id, "inst-0");
        assert_eq!(lb.select("order", &list).unwrap().instance_id, "inst-1");
    }

    #[test]
    fn random_empty_list_returns_none() {
        let lb = Random::new();
        assert!(lb.select("order", &[]).is_none());
    }

    #[test]
    fn random_picks_from_the_candidate_list() {
        let lb = Random::new();
        let list = instances(5);
        let picked = lb.select("order", &list).unwrap();
        assert!(list.iter().any(|r| r.instance_id == picked.instance_id));
    }

    #[tokio::test]
    async fn least_connections_prefers_the_idlest_instance() {
        let pool = ConnectionPool::new(Duration::from_secs(1));
        let lb = LeastConnections::new(Arc::clone(&pool));
        let list = instances(2);

        // No connections pooled yet: both tied at zero, first-seen wins.
        assert_eq!(lb.select("order", &list).unwrap().instance_id, "inst-0");
    }

    #[test]
    fn least_connections_empty_list_returns_none() {
        let pool = ConnectionPool::new(Duration::from_secs(1));
        let lb = LeastConnections::new(pool);
        assert!(lb.select("order", &[]).is_none());
    }
}
