//! Metrics collection and export for chatrelay.
//!
//! This crate provides a unified metrics interface using the `metrics` crate facade.
//! When the `prometheus` feature is enabled, metrics are exported in Prometheus format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chatrelay_metrics::{counter, histogram, replier};
//!
//! counter!(replier::ENQUEUED_TOTAL, "kind" => "text").increment(1);
//! histogram!(replier::DELIVERY_DURATION_SECONDS).record(0.042);
//! ```
//!
//! # Features
//!
//! - `prometheus`: Enable Prometheus metrics export via the gateway `/metrics` endpoint

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
