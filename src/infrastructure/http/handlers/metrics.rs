use warp::Reply;

use crate::shared::metrics::MetricsUtils;

/// Prometheus text exposition
pub async fn handle_metrics_request(metrics: MetricsUtils) -> Result<impl Reply, warp::Rejection> {
    Ok(warp::reply::with_header(
        metrics.render(),
        "content-type",
        "text/plain; version=0.0.4",
    ))
}
