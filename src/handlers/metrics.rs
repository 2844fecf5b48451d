use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

use crate::AppState;

pub struct MetricsState {
    pub handle: PrometheusHandle,
}

fn builder() -> Result<PrometheusBuilder, BuildError> {
    // Entry writes are single-row transactions; anything past 2.5s is an outage
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("dtr_http_request_duration_seconds".to_string()),
        &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
    )
}

/// Set up the Prometheus metrics recorder as the global recorder
pub fn setup_metrics_recorder() -> Result<MetricsState, BuildError> {
    let handle = builder()?.install_recorder()?;
    Ok(MetricsState { handle })
}

impl MetricsState {
    /// A handle whose recorder is never installed; renders nothing.
    pub fn detached() -> Self {
        Self {
            handle: PrometheusBuilder::new().build_recorder().handle(),
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = state.metrics.handle.render();
    (StatusCode::OK, metrics)
}
