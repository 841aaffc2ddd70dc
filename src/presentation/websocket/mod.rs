//! WebSocket Gateway
//!
//! Real-time resource access via WebSocket connections.

pub mod gateway;
pub mod handler;
pub mod router;

pub use gateway::{BroadcastReport, Broadcaster, IdGenerator, SessionRegistry, SkipFn};
pub use handler::{ws_handler, BANNER};
pub use router::{MessageRouter, ResourceDispatcher};
