use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec, TextEncoder,
};

// Metrics registry
static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap()
});

static ADMISSION_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "admission_decisions_total",
        "Total number of admission decisions",
        &["outcome"]
    )
    .unwrap()
});

static STORE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "counter_store_latency_seconds",
        "Counter store round trip latency in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]
    )
    .unwrap()
});

static STORE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "counter_store_errors_total",
        "Total number of failed counter store calls",
        &["operation"]
    )
    .unwrap()
});

static STORE_FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "counter_store_fallbacks_total",
        "Admission checks resolved by the store failure policy",
        &["policy"]
    )
    .unwrap()
});

pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn record_http_request(method: &str, path: &str, status: u16) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
    }

    pub fn record_decision(outcome: &str) {
        ADMISSION_DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn record_store_latency(operation: &str, duration: f64) {
        STORE_LATENCY.with_label_values(&[operation]).observe(duration);
    }

    pub fn record_store_error(operation: &str) {
        STORE_ERRORS_TOTAL.with_label_values(&[operation]).inc();
    }

    pub fn record_fallback(policy: &str) {
        STORE_FALLBACKS_TOTAL.with_label_values(&[policy]).inc();
    }

    /// Export all metrics in Prometheus format
    pub fn export() -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        encoder.encode_to_string(&metric_families)
    }
}
