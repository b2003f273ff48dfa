//! HTTP handler definitions for the health/metrics surface.
//!
//! Defines `AppState` (the shared state carried through axum extractors)
//! and re-exports all handler functions for convenient access when building
//! the router.

pub mod health;
pub mod metrics;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use metrics::metrics_handler;

use std::sync::Arc;
use std::time::Instant;

use crate::metrics::MetricsSurface;
use crate::network::ShutdownController;
use crate::registry::RegistryCore;

/// Shared application state passed to all axum handlers via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative service registry.
    pub registry: Arc<RegistryCore>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Prometheus recorder handle, rendered by `GET /metrics`.
    pub metrics: Arc<MetricsSurface>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
