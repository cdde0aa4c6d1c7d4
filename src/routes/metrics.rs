use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the counters emitted by the services.
pub fn describe_metrics() {
    metrics::describe_counter!("generation_jobs_total", "Total generation jobs submitted");
    metrics::describe_counter!("generation_jobs_completed", "Generation jobs that completed");
    metrics::describe_counter!("generation_jobs_failed", "Generation jobs that failed or timed out");
    metrics::describe_counter!("credits_refunded_total", "Credits returned for failed jobs");
    metrics::describe_counter!("campaign_shares_total", "Campaign share attempts by outcome");
    metrics::describe_counter!("reward_claims_total", "Reward claims by outcome");
}
