//! # Application Layer
//!
//! Services orchestrating the domain: the connection service owns the
//! session registry, the message router and the broadcaster.

pub mod services;

pub use services::ConnectionService;
