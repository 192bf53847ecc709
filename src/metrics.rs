use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("shortlink_requests_total", "Total number of requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("shortlink_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref URLS_CREATED: Counter =
        register_counter!("shortlink_urls_created_total", "Short URLs created").unwrap();
    pub static ref REDIRECTS_TOTAL: Counter =
        register_counter!("shortlink_redirects_total", "Redirects served").unwrap();
    pub static ref CLICKS_RECORDED: Counter =
        register_counter!("shortlink_clicks_recorded_total", "Click events stored").unwrap();
    pub static ref CLICKS_DROPPED: Counter =
        register_counter!("shortlink_clicks_dropped_total", "Click events dropped because the queue was full").unwrap();
    pub static ref RATE_LIMITER_KEYS: Gauge =
        register_gauge!("shortlink_rate_limiter_keys", "Clients currently tracked by the rate limiter").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "shortlink_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}
