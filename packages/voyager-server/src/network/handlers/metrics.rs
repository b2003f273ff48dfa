//! `/metrics` endpoint, rendering the process-wide Prometheus recorder.

use axum::extract::State;

use super::AppState;

/// Renders the current Prometheus text-exposition snapshot.
pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
