//! Change sequence watermark
//!
//! The server numbers every change it accepts. The client remembers the
//! highest id it fully processed and resumes from there after a restart.
//! The watermark only ever moves forward, and callers move it only after
//! the corresponding change has been applied.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WatermarkState {
    last_processed_id: i64,
}

/// Persistent high-water mark over server change ids
#[derive(Clone)]
pub struct Watermark {
    state: Arc<Mutex<WatermarkState>>,
    path: Option<PathBuf>,
}

impl Watermark {
    /// Open a watermark backed by a state file. A missing file starts at zero.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let state = if path.exists() {
            serde_json::from_slice(&std::fs::read(&path)?)?
        } else {
            WatermarkState::default()
        };
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            path: Some(path),
        })
    }

    /// Open an unbacked in-memory watermark (primarily for tests)
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self {
            state: Arc::new(Mutex::new(WatermarkState::default())),
            path: None,
        }
    }

    /// The highest fully processed change id
    #[must_use]
    pub fn last_processed(&self) -> i64 {
        self.lock().last_processed_id
    }

    /// Move the mark to `id` if that is forward progress, persisting the new
    /// value. Returns whether the mark moved.
    pub fn advance(&self, id: i64) -> Result<bool> {
        {
            let mut state = self.lock();
            if id <= state.last_processed_id {
                return Ok(false);
            }
            state.last_processed_id = id;
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&*self.lock())?;
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, WatermarkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_forward_moves_count() {
        let mark = Watermark::open_in_memory();
        assert!(mark.advance(5).unwrap());
        assert!(!mark.advance(3).unwrap());
        assert!(!mark.advance(5).unwrap());
        assert_eq!(mark.last_processed(), 5);
    }

    #[test]
    fn the_mark_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermark.json");

        let mark = Watermark::open(&path).unwrap();
        mark.advance(41).unwrap();
        mark.advance(42).unwrap();

        let reopened = Watermark::open(&path).unwrap();
        assert_eq!(reopened.last_processed(), 42);
    }
}
