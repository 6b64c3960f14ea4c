//! # HTTP Middleware
//!
//! - `metrics` — request counters recorded through the `metrics` facade and
//!   rendered by the Prometheus exporter at `/metrics`.

pub mod metrics;
