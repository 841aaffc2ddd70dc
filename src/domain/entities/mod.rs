//! # Domain Entities
//!
//! Entities with identity and a lifecycle.
//!
//! - **ConnectionSession**: one accepted connection, its sender and watchers
//! - **WatcherRegistry** / **WatcherHandle**: live subscriptions of a connection

mod session;
mod watcher;

pub use session::*;
pub use watcher::*;
