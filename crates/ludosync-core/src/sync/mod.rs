//! Sync engine state primitives

mod grace;
mod settings;
mod watermark;

pub use grace::GraceRegistry;
pub use settings::{SharedSettings, SyncSettings};
pub use watermark::Watermark;
