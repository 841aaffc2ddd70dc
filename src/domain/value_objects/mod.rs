//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **ConnectionId**: random UUID assigned to every accepted connection
//! - **SubscriptionKey**: order-independent key for a set of watch parameters

mod connection_id;
mod subscription_key;

pub use connection_id::*;
pub use subscription_key::*;
