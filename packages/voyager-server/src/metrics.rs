//! Metrics Surface: Prometheus counters and gauges rendered at `/metrics`.
//!
//! Grounded in the teacher's now-retired `service/middleware/metrics.rs`
//! `MetricsLayer`/`MetricsService` instrumentation wrapper. That pattern
//! recorded timing via bare `tracing` spans; this rebuilds the same
//! instrument-every-operation idea on `metrics` +
//! `metrics-exporter-prometheus`, the ambient metrics stack named in
//! spec.md's observability section.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::sync::watch;
use tracing::info;

use crate::registry::RegistryCore;

/// Render target for the `/metrics` HTTP endpoint.
pub struct MetricsSurface {
    handle: PrometheusHandle,
}

impl MetricsSurface {
    /// Installs the process-wide Prometheus recorder. Call at most once per
    /// process; subsequent calls from tests should use [`Self::noop`].
    ///
    /// # Panics
    ///
    /// Panics if a global recorder is already installed.
    #[must_use]
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder");
        Self { handle }
    }

    /// A handle detached from the global recorder, for use in tests that
    /// construct `AppState` without installing metrics globally.
    #[must_use]
    pub fn noop() -> Self {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        Self { handle }
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Increments the total-registrations counter for `service_name`.
pub fn record_registration(service_name: &str) {
    metrics::counter!(
        "voyager_registrations_total",
        "service" => service_name.to_string(),
    )
    .increment(1);
}

/// Increments the total-deregistrations counter for `service_name`.
pub fn record_deregistration(service_name: &str) {
    metrics::counter!(
        "voyager_deregistrations_total",
        "service" => service_name.to_string(),
    )
    .increment(1);
}

/// Increments the Discover outcome counter. `outcome` is `"success"` or
/// `"not_found"`.
pub fn record_discovery(service_name: &str, outcome: &'static str) {
    metrics::counter!(
        "voyager_discoveries_total",
        "service" => service_name.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

pub fn record_refresh_attempt() {
    metrics::counter!("voyager_cache_refresh_attempts_total").increment(1);
}

pub fn record_refresh_error() {
    metrics::counter!("voyager_cache_refresh_errors_total").increment(1);
}

/// Periodically recomputes the per-service instance-count gauge under the
/// Registry Core's read lock.
pub struct InstanceCountTicker {
    registry: Arc<RegistryCore>,
    period: Duration,
}

impl InstanceCountTicker {
    #[must_use]
    pub fn new(registry: Arc<RegistryCore>, period: Duration) -> Self {
        Self { registry, period }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for (service, count) in self.registry.instance_counts_by_service() {
                        #[allow(clippy::cast_precision_loss)]
                        let count = count as f64;
                        metrics::gauge!("voyager_instances", "service" => service).set(count);
                    }
                }
                _ = shutdown.changed() => return,
            }
        }
    }
}

/// Periodically logs a one-line status summary -- registry size, mode, and
/// uptime -- at `log_interval` (spec.md's `logInterval`). Same
/// interval-loop-plus-`watch`-shutdown shape as [`InstanceCountTicker`];
/// this one reports to the log stream instead of a gauge.
pub struct StatusLogger {
    registry: Arc<RegistryCore>,
    start_time: Instant,
    period: Duration,
}

impl StatusLogger {
    #[must_use]
    pub fn new(registry: Arc<RegistryCore>, start_time: Instant, period: Duration) -> Self {
        Self {
            registry,
            start_time,
            period,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mode = if self.registry.in_memory_mode() { "in_memory" } else { "store_backed" };
                    info!(
                        instances = self.registry.instance_count(),
                        mode,
                        uptime_secs = self.start_time.elapsed().as_secs(),
                        "status",
                    );
                }
                _ = shutdown.changed() => return,
            }
        }
    }
}
