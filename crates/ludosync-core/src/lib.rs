//! ludosync-core - Core library for Ludosync
//!
//! This crate contains the change application state machine, the library
//! store abstraction, the wire mappings and the server transport used by
//! every Ludosync interface.

pub mod apply;
pub mod diff;
pub mod engine;
pub mod error;
pub mod library;
pub mod models;
pub mod notify;
pub mod outbound;
pub mod progress;
pub mod stream;
pub mod sync;
pub mod transport;

pub use error::{Error, Result};
pub use models::{ChangeEnvelope, EntityId, ObjectType};
