//! Progress reporting for long-running manual operations

/// Reporting surface handed to bulk fetch and push operations.
///
/// The engine calls [`begin`](Progress::begin) once, [`step`](Progress::step)
/// before each item, and polls [`is_cancelled`](Progress::is_cancelled) at
/// item boundaries; a cancelled operation stops cleanly with everything
/// processed so far kept.
pub trait Progress: Send + Sync {
    /// Announce how many steps the operation spans
    fn begin(&self, total: u64);
    /// Announce the item about to be handled
    fn step(&self, detail: &str);
    /// Polled between items; true stops the operation at the next boundary
    fn is_cancelled(&self) -> bool;
}

/// Default reporter that logs step boundaries
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn begin(&self, total: u64) {
        tracing::info!(total, "starting bulk operation");
    }

    fn step(&self, detail: &str) {
        tracing::debug!("{detail}");
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}
