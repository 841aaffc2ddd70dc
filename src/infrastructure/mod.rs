//! # Infrastructure Layer
//!
//! Process-wide infrastructure used by the broker.
//!
//! - **metrics**: Prometheus registry and helpers

pub mod metrics;
