//! HTTP Surface
//!
//! Routes and handlers for the plain HTTP endpoints.

pub mod handlers;
pub mod routes;
