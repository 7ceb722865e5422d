use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("nucleus_client_requests_total", "Total number of API requests issued by callers")
            .expect("register nucleus_client_requests_total");
    pub static ref API_ERRORS: Counter =
        register_counter!("nucleus_client_api_errors_total", "Total failed API calls")
            .expect("register nucleus_client_api_errors_total");
    pub static ref CACHE_HITS: Counter =
        register_counter!("nucleus_client_cache_hits_total", "Total cache hits")
            .expect("register nucleus_client_cache_hits_total");
    pub static ref CACHE_MISSES: Counter =
        register_counter!("nucleus_client_cache_misses_total", "Total cache misses")
            .expect("register nucleus_client_cache_misses_total");
    pub static ref CACHE_COALESCED: Counter = register_counter!(
        "nucleus_client_cache_coalesced_total",
        "Cache misses served by another caller's in-flight fetch"
    )
    .expect("register nucleus_client_cache_coalesced_total");
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("nucleus_client_cache_size", "Current number of items in cache")
            .expect("register nucleus_client_cache_size");
    pub static ref RATE_LIMIT_WAITS: Counter = register_counter!(
        "nucleus_client_rate_limit_waits_total",
        "Admissions that had to wait for the rate window"
    )
    .expect("register nucleus_client_rate_limit_waits_total");
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "nucleus_client_request_latency_seconds",
        "Request latency in seconds, cache hits included"
    )
    .expect("register nucleus_client_request_latency_seconds");
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {}\n", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
