use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder,
    register_histogram_vec, register_int_counter_vec,
};
use std::sync::OnceLock;
use std::time::Instant;

const METRIC_PREFIX: &str = "cfcert_control";

/// 证书供应服务的全部指标，进程内只注册一次
struct CertMetrics {
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    ensure_outcomes: IntCounterVec,
    authority_requests: IntCounterVec,
}

impl CertMetrics {
    fn register() -> Result<Self, prometheus::Error> {
        Ok(Self {
            http_requests: register_int_counter_vec!(
                Opts::new(
                    format!("{METRIC_PREFIX}_http_requests_total"),
                    "证书 API 请求总数"
                ),
                &["method", "path", "status"]
            )?,
            http_duration: register_histogram_vec!(
                HistogramOpts::new(
                    format!("{METRIC_PREFIX}_http_request_duration_seconds"),
                    "证书 API 请求耗时（秒），签发请求包含签发机构往返",
                ),
                &["method", "path"]
            )?,
            ensure_outcomes: register_int_counter_vec!(
                Opts::new(
                    format!("{METRIC_PREFIX}_ensure_total"),
                    "证书供应结果计数（reused/issued/failed）"
                ),
                &["outcome"]
            )?,
            authority_requests: register_int_counter_vec!(
                Opts::new(
                    format!("{METRIC_PREFIX}_authority_requests_total"),
                    "Origin CA 签发请求计数（success/rejected/transport_error）"
                ),
                &["result"]
            )?,
        })
    }
}

/// 注册失败时只记录一次日志，之后所有指标操作静默跳过
fn cert_metrics() -> Option<&'static CertMetrics> {
    static METRICS: OnceLock<Option<CertMetrics>> = OnceLock::new();
    METRICS
        .get_or_init(|| match CertMetrics::register() {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                tracing::error!("failed to register certificate metrics: {}", err);
                None
            }
        })
        .as_ref()
}

pub fn inc_ensure_outcome(outcome: &str) {
    if let Some(m) = cert_metrics() {
        m.ensure_outcomes.with_label_values(&[outcome]).inc();
    }
}

pub fn inc_authority_request(result: &str) {
    if let Some(m) = cert_metrics() {
        m.authority_requests.with_label_values(&[result]).inc();
    }
}

/// Must be installed with `route_layer` so the matched route is known.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "<unmatched>".to_owned());

    let started = Instant::now();
    let response = next.run(req).await;

    if let Some(m) = cert_metrics() {
        let status = response.status();
        m.http_requests
            .with_label_values(&[method.as_str(), route.as_str(), status.as_str()])
            .inc();
        m.http_duration
            .with_label_values(&[method.as_str(), route.as_str()])
            .observe(started.elapsed().as_secs_f64());
    }

    response
}

pub fn render_metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("failed to encode metrics: {}", err);
        return (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
        buffer,
    )
        .into_response()
}
