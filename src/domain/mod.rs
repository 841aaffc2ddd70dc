//! # Domain Layer
//!
//! The domain layer contains the core vocabulary of the broker.
//! It is independent of the HTTP framework and of the transport.
//!
//! ## Structure
//!
//! - **entities**: Connection sessions and their watcher registries
//! - **value_objects**: Connection identity and subscription keys
//! - **envelope**: Inbound and outbound wire envelopes
//! - **resource**: The resource contract and the resource table
//!
//! ## Design Principles
//!
//! - Connections are referenced by identity everywhere outside the registry
//! - Sessions are fixed-shape values built once at connect time
//! - Resources keep a detached sender, never an owning session reference

pub mod entities;
pub mod envelope;
pub mod resource;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use envelope::*;
pub use resource::{Resource, ResourceCall, ResourceError, ResourceResult, ResourceTable};
pub use value_objects::*;
