use std::sync::Arc;

use axum::extract::State;
use axum::http::header;

use super::state::AppState;

/// Content-Type for `OpenMetrics` text exposition format.
const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Serves the agent registry in `OpenMetrics` text format.
pub async fn metrics(
    State(state): State<Arc<AppState>>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    let body = state.metrics.encode();
    ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body)
}
