//! # Resource Broker Library
//!
//! A real-time WebSocket broker fronting named server-side resources:
//! - JSON envelopes routed by `handler` to a resource verb
//! - Per-connection watcher registry with idempotent teardown
//! - Best-effort broadcast to every open connection
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Envelopes, sessions, watchers and the resource trait
//! - **Application Layer**: The connection service orchestrating the server
//! - **Infrastructure Layer**: Prometheus metrics
//! - **Presentation Layer**: HTTP routes and the WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! resource_broker/
//! +-- config/         Configuration management
//! +-- domain/         Envelopes, sessions, watchers, resources
//! +-- application/    Connection service
//! +-- infrastructure/ Metrics
//! +-- presentation/   HTTP routes, middleware and WebSocket handlers
//! +-- shared/         Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core broker types
pub mod domain;

// Application layer - Connection orchestration
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
