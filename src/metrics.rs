use crate::server::config::MetricsConfig;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};
use tracing::info;

/// Install the Prometheus recorder with its own HTTP listener
pub fn init_metrics(
    config: &MetricsConfig,
) -> Result<PrometheusHandle, Box<dyn std::error::Error + Send + Sync>> {
    let builder = PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .add_global_label("service", "content_generator");

    let handle = builder.install_recorder()?;

    info!("Metrics server started on :{}/metrics", config.port);
    Ok(handle)
}

/// Middleware to collect HTTP request metrics
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    gauge!("http_requests_active").increment(1.0);

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    counter!("http_requests_total", "method" => method.clone(), "path" => path.clone(), "status" => status.clone())
        .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.clone(), "path" => path.clone(), "status" => status)
        .record(duration.as_secs_f64());

    gauge!("http_requests_active").decrement(1.0);

    if response.status().is_server_error() {
        counter!("http_errors_total", "method" => method, "path" => path).increment(1);
    }

    response
}

/// Track JWT validation metrics
pub fn track_jwt_validation(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("jwt_validations_total", "result" => result).increment(1);
}

pub fn track_api_key_validation(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("api_key_validations_total", "result" => result).increment(1);
}

/// Track one completion provider call
pub fn track_completion_call(model: &str, success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    counter!("completion_requests_total", "model" => model.to_string(), "result" => result)
        .increment(1);
    histogram!("completion_request_duration_seconds", "model" => model.to_string())
        .record(duration.as_secs_f64());
}

/// Track a finished generation request by outcome (`stored`, `quota_exhausted`, `failed`)
pub fn track_generation(content_type: &str, outcome: &'static str) {
    counter!("generations_total", "content_type" => content_type.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Track a request turned away because the plan's quota is used up
pub fn track_quota_rejection(plan: &str) {
    counter!("quota_rejections_total", "plan" => plan.to_string()).increment(1);
}

/// Track a payment webhook by provider and result
pub fn track_webhook(provider: &'static str, status: StatusCode) {
    counter!("webhooks_total", "provider" => provider, "status" => status.as_u16().to_string())
        .increment(1);
}

/// Track a background job run
pub fn track_job_run(job: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("job_runs_total", "job" => job.to_string(), "result" => result).increment(1);
}
