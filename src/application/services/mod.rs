//! Application Services
//!
//! - **ConnectionService**: connection lifecycle, dispatch and broadcast

mod connection_service;

pub use connection_service::ConnectionService;
