//! Prometheus metrics endpoint

use axum::response::IntoResponse;

use crate::infrastructure::metrics;

/// Prometheus metrics endpoint handler
pub async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}
