//! Metric name and label definitions.
//!
//! This module defines all metric names and common label keys used throughout chatrelay.
//! Centralizing these definitions keeps names consistent between the crates that record
//! them and the dashboards that read them.

/// Inbound HTTP metrics
pub mod http {
    /// Total number of inbound HTTP requests handled
    pub const REQUESTS_TOTAL: &str = "chatrelay_http_requests_total";
    /// Duration of inbound HTTP requests in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "chatrelay_http_request_duration_seconds";
}

/// Inbound chat event metrics
pub mod inbound {
    /// Total chat events accepted by the `/db` endpoint
    pub const EVENTS_TOTAL: &str = "chatrelay_inbound_events_total";
    /// Chat events rejected during validation or decoding
    pub const EVENTS_REJECTED_TOTAL: &str = "chatrelay_inbound_events_rejected_total";
    /// Nested payload fields that could not be parsed and were kept raw
    pub const NESTED_DECODE_FALLBACKS_TOTAL: &str = "chatrelay_inbound_nested_decode_fallbacks_total";
    /// Handler processing duration in seconds
    pub const HANDLER_DURATION_SECONDS: &str = "chatrelay_inbound_handler_duration_seconds";
}

/// Outbound reply dispatcher metrics
pub mod replier {
    /// Messages appended to a dispatcher queue (labelled by kind)
    pub const ENQUEUED_TOTAL: &str = "chatrelay_replier_enqueued_total";
    /// Delivery attempts (labelled by kind and success)
    pub const DELIVERIES_TOTAL: &str = "chatrelay_replier_deliveries_total";
    /// Delivery call duration in seconds
    pub const DELIVERY_DURATION_SECONDS: &str = "chatrelay_replier_delivery_duration_seconds";
    /// Times the drain loop had to wait for the throttle window
    pub const THROTTLED_TOTAL: &str = "chatrelay_replier_throttled_total";
    /// Messages dropped because the dispatcher was shut down
    pub const ABANDONED_TOTAL: &str = "chatrelay_replier_abandoned_total";
    /// Image encodings that failed before enqueue
    pub const ENCODING_ERRORS_TOTAL: &str = "chatrelay_replier_encoding_errors_total";
}

/// Remote data proxy metrics
pub mod proxy {
    /// Query calls (labelled by outcome: rows, empty, failed)
    pub const QUERIES_TOTAL: &str = "chatrelay_proxy_queries_total";
    /// Query call duration in seconds
    pub const QUERY_DURATION_SECONDS: &str = "chatrelay_proxy_query_duration_seconds";
    /// Decrypt calls (labelled by success)
    pub const DECRYPTS_TOTAL: &str = "chatrelay_proxy_decrypts_total";
    /// Schema capability probes that reached the remote store
    pub const CAPABILITY_PROBES_TOTAL: &str = "chatrelay_proxy_capability_probes_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const KIND: &str = "kind";
    pub const OUTCOME: &str = "outcome";
    pub const SUCCESS: &str = "success";
    pub const REASON: &str = "reason";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP request duration buckets (in seconds)
    /// Covers 1ms to 60s
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Outbound delivery buckets (in seconds), tighter around the 100ms throttle window
    pub static DELIVERY_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]
    });
}
