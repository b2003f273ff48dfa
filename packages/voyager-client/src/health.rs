//! The client's health-check loop.
//!
//! Background task with cooperative cancellation, the same shape as the
//! server's [`voyager_server::registry::janitor::Janitor`] and
//! [`voyager_server::registry::refresher::CacheRefresher`]: a `watch`
//! receiver selected against an interval tick, observed at the next await
//! point rather than torn down abruptly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use voyager_core::{HealthRequest, HealthStatus, Registration, Request, WireResponse};

use crate::conn::ServerConnection;

const HEALTH_CHECK_DEADLINE: Duration = Duration::from_secs(3);
const REGISTER_DEADLINE: Duration = Duration::from_secs(3);

/// Sends a `HealthCheck` for `registration` every `interval`; on any
/// non-success response (including a transport failure) re-registers with
/// the last-known `(name, instanceId, address, port, metadata)`, preserving
/// metadata across the retry (§9 open question, resolved: reuse the
/// original Register's metadata rather than dropping it).
pub async fn run(
    conn: Arc<ServerConnection>,
    registration: Registration,
    auth_token: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(&conn, &registration, &auth_token).await;
            }
            _ = shutdown.changed() => {
                debug!(instance_id = %registration.instance_id, "health-check loop stopping");
                return;
            }
        }
    }
}

async fn tick(conn: &ServerConnection, registration: &Registration, auth_token: &str) {
    let token = (!auth_token.is_empty()).then(|| auth_token.to_string());
    let request = Request::HealthCheck {
        auth_token: token.clone(),
        request: HealthRequest {
            service_name: registration.service_name.clone(),
            instance_id: registration.instance_id.clone(),
        },
    };

    let healthy = match conn.call(request, HEALTH_CHECK_DEADLINE).await {
        Ok(WireResponse::HealthCheck(resp)) => resp.status == HealthStatus::Healthy,
        Ok(_) => false,
        Err(err) => {
            warn!(instance_id = %registration.instance_id, %err, "health check failed");
            false
        }
    };

    if healthy {
        return;
    }

    warn!(
        instance_id = %registration.instance_id,
        "health check unhealthy, re-registering"
    );
    let re_register = Request::Register {
        auth_token: token,
        registration: registration.clone(),
    };
    if let Err(err) = conn.call(re_register, REGISTER_DEADLINE).await {
        warn!(instance_id = %registration.instance_id, %err, "re-register failed");
    }
}
