use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref OPERATION_LATENCY_US: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "workload_operation_latency_us",
            "Histogram of store operation latency in microseconds"
        )
        .buckets(exponential_buckets(10.0, 2.0, 20).expect("valid buckets")),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("workload_operations_total", "Successful store operations"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref OPERATION_BYTES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("workload_operation_bytes_total", "Key and value bytes written or read"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref OPERATION_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("workload_errors_total", "Failed store operations"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref RECONNECTS_TOTAL: IntCounter =
        IntCounter::new("workload_reconnects_total", "Client reconnects after their use budget")
            .expect("metric can not be created");

    pub static ref WATCH_EVENTS_TOTAL: IntCounter =
        IntCounter::new("workload_watch_events_total", "Watch events received")
            .expect("metric can not be created");

    pub static ref ACTIVE_WATCHERS: IntGauge =
        IntGauge::new("workload_active_watchers", "Watch subscriptions currently receiving")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(OPERATION_LATENCY_US.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(OPERATIONS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(OPERATION_BYTES_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(OPERATION_ERRORS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(RECONNECTS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(WATCH_EVENTS_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(ACTIVE_WATCHERS.clone()))
            .expect("collector can be registered");
    });
}

pub(crate) fn observe_operation(
    kind: &str,
    latency: Duration,
    bytes: u64,
) {
    OPERATION_LATENCY_US
        .with_label_values(&[kind])
        .observe(latency.as_micros() as f64);
    OPERATIONS_TOTAL.with_label_values(&[kind]).inc();
    if bytes > 0 {
        OPERATION_BYTES_TOTAL.with_label_values(&[kind]).inc_by(bytes);
    }
}

pub(crate) fn observe_error(kind: &str) {
    OPERATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!(port, "Serving metrics at /metrics");
    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_metrics())
}

/// Text exposition of every registered metric
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
