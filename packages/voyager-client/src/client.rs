//! The discovery client's public entry point.
//!
//! One `DiscoveryClient` per process: dials the registry server once at
//! construction, then serves Register/Discover/Deregister/Close plus the
//! background health-check loop over that single connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use voyager_core::{InstanceId, Registration, Request, ServiceQuery, WireResponse};

use crate::balancer::{LoadBalancer, RoundRobin};
use crate::cache::DiscoveryCache;
use crate::config::ClientConfig;
use crate::conn::ServerConnection;
use crate::error::ClientError;
use crate::pool::{ConnectionPool, PooledConnection};

const REGISTER_DEADLINE: Duration = Duration::from_secs(3);
const DISCOVER_DEADLINE: Duration = Duration::from_secs(3);
const DEREGISTER_DEADLINE: Duration = Duration::from_secs(3);

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Single entry point for a process's service-discovery needs: registers
/// this process, runs its health-check loop, and answers
/// "give me a live connection for service X" on demand.
pub struct DiscoveryClient {
    conn: Arc<ServerConnection>,
    config: ClientConfig,
    cache: DiscoveryCache,
    balancer: Arc<dyn LoadBalancer>,
    pool: Arc<ConnectionPool>,
    registration: Mutex<Option<Registration>>,
    health_task: Mutex<Option<(JoinHandle<()>, watch::Sender<bool>)>>,
}

impl DiscoveryClient {
    /// Dials the registry server with up to `config.max_retries` attempts,
    /// separated by `config.retry_delay`. Failure is fatal to construction.
    /// Uses the round-robin load balancer; see
    /// [`Self::connect_with_balancer`] for the other policies.
    pub async fn connect(config: ClientConfig) -> Result<Arc<Self>, ClientError> {
        Self::connect_with_balancer(config, Arc::new(RoundRobin::new())).await
    }

    /// Like [`Self::connect`], but with an explicit load-balancing policy.
    pub async fn connect_with_balancer(
        config: ClientConfig,
        balancer: Arc<dyn LoadBalancer>,
    ) -> Result<Arc<Self>, ClientError> {
        let conn = Arc::new(
            ServerConnection::connect(&config.discovery_addr, config.max_retries, config.retry_delay)
                .await?,
        );
        let pool = ConnectionPool::new(config.connection_timeout);
        let cache = DiscoveryCache::new(config.cache_ttl);

        Ok(Arc::new(Self {
            conn,
            balancer,
            pool,
            cache,
            config,
            registration: Mutex::new(None),
            health_task: Mutex::new(None),
        }))
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Registers this process's service instance and starts the
    /// health-check loop. Invalid inputs fail before any RPC is sent.
    ///
    /// Generates a locally unique `instanceId` when none is already set on
    /// a prior call for this client (re-registering reuses the same id).
    pub async fn register(
        &self,
        service_name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        metadata: HashMap<String, String>,
    ) -> Result<(), ClientError> {
        let service_name = service_name.into();
        let address = address.into();

        if service_name.is_empty() {
            return Err(ClientError::InvalidArgument("serviceName must not be empty".into()));
        }
        if address.is_empty() {
            return Err(ClientError::InvalidArgument("address must not be empty".into()));
        }
        if port == 0 {
            return Err(ClientError::InvalidArgument("port must be non-zero".into()));
        }

        let instance_id = self
            .registration
            .lock()
            .as_ref()
            .map(|r| r.instance_id.clone())
            .unwrap_or_else(generate_instance_id);

        let registration = Registration {
            service_name,
            instance_id,
            address,
            port,
            metadata,
        };

        let token = self.auth_token();
        self.conn
            .call(
                Request::Register {
                    auth_token: token,
                    registration: registration.clone(),
                },
                REGISTER_DEADLINE,
            )
            .await?;

        info!(
            service_name = %registration.service_name,
            instance_id = %registration.instance_id,
            "registered with registry server"
        );
        *self.registration.lock() = Some(registration.clone());
        self.start_health_loop(registration);
        Ok(())
    }

    /// Resolves `service_name` to a pooled connection for one live
    /// instance, chosen by the configured load balancer.
    ///
    /// Consults the discovery cache first; on miss, queries the registry
    /// server with `healthyOnly = true` and caches the result for
    /// `cache_ttl`.
    pub async fn discover(&self, service_name: &str) -> Result<Arc<PooledConnection>, ClientError> {
        let list = match self.cache.get(service_name) {
            Some(list) => list,
            None => {
                let token = self.auth_token();
                let response = self
                    .conn
                    .call(
                        Request::Discover {
                            auth_token: token,
                            query: ServiceQuery {
                                service_name: service_name.to_string(),
                                healthy_only: true,
                            },
                        },
                        DISCOVER_DEADLINE,
                    )
                    .await?;
                let WireResponse::Discover(list) = response else {
                    return Err(ClientError::UnexpectedResponse);
                };
                self.cache.put(service_name, list.clone());
                list
            }
        };

        let picked = self
            .balancer
            .select(service_name, &list.instances)
            .ok_or(ClientError::Unavailable)?;

        self.pool.get(&picked.socket_addr()).await
    }

    /// Stops the health-check loop and deregisters the current instance, if
    /// any.
    pub async fn deregister(&self) -> Result<(), ClientError> {
        self.stop_health_loop();

        let Some(registration) = self.registration.lock().take() else {
            return Ok(());
        };

        let token = self.auth_token();
        self.conn
            .call(
                Request::Deregister {
                    auth_token: token,
                    instance: InstanceId {
                        service_name: registration.service_name,
                        instance_id: registration.instance_id,
                    },
                },
                DEREGISTER_DEADLINE,
            )
            .await?;
        Ok(())
    }

    /// Stops the health-check loop, closes the pool, and closes the server
    /// connection. Idempotent.
    pub async fn close(&self) {
        self.stop_health_loop();
        self.pool.close().await;
        self.conn.close().await;
    }

    fn auth_token(&self) -> Option<String> {
        (!self.config.auth_token.is_empty()).then(|| self.config.auth_token.clone())
    }

    /// Starting is idempotent: a second `register()` call for an already
    /// running client does not spawn a duplicate loop.
    fn start_health_loop(&self, registration: Registration) {
        let mut guard = self.health_task.lock();
        if guard.is_some() {
            return;
        }

        let (tx, rx) = watch::channel(false);
        let conn = Arc::clone(&self.conn);
        let auth_token = self.config.auth_token.clone();
        let interval = self.config.effective_health_check_interval();
        let handle = tokio::spawn(crate::health::run(conn, registration, auth_token, interval, rx));
        *guard = Some((handle, tx));
    }

    fn stop_health_loop(&self) {
        if let Some((_, tx)) = self.health_task.lock().take() {
            let _ = tx.send(true);
        }
    }
}

/// `<hostname>-<monotonic>` per the construction contract. Falls back to
/// `"instance"` when `HOSTNAME` is unset, which is the common case outside
/// containerized deployments.
fn generate_instance_id() -> String {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "instance".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let ordinal = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{hostname}-{nanos}-{ordinal}")
}
