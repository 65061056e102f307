//! Sync behavior settings

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Behavior switches for the sync engine.
///
/// Everything defaults to off; a fresh install does nothing until the
/// server address is confirmed and synchronization is switched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncSettings {
    /// Master switch; nothing is sent or received while off
    pub synchronization_enabled: bool,
    /// Base URL of the sync backend
    pub server_address: String,
    /// Publish local mutations as they happen
    pub send_live_changes: bool,
    /// Consume the server's live change stream
    pub fetch_live_changes: bool,
    /// Catch up on missed changes when the engine starts
    pub fetch_changes_at_startup: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            synchronization_enabled: false,
            server_address: "http://localhost:8093".to_string(),
            send_live_changes: false,
            fetch_live_changes: false,
            fetch_changes_at_startup: false,
        }
    }
}

impl SyncSettings {
    /// Server address without a trailing slash, ready for path joining
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.server_address.trim_end_matches('/')
    }
}

/// Live settings view shared across the engine's components.
///
/// The outbound dispatcher consults it per event and the streaming loop per
/// iteration, so a replaced settings value takes effect without a restart.
#[derive(Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<SyncSettings>>,
}

impl SharedSettings {
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    #[must_use]
    pub fn snapshot(&self) -> SyncSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, settings: SyncSettings) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_keep_the_engine_quiet() {
        let settings = SyncSettings::default();
        assert!(!settings.synchronization_enabled);
        assert!(!settings.send_live_changes);
        assert_eq!(settings.server_address, "http://localhost:8093");
    }

    #[test]
    fn base_url_strips_trailing_slashes() {
        let settings = SyncSettings {
            server_address: "https://sync.example.net/".into(),
            ..SyncSettings::default()
        };
        assert_eq!(settings.base_url(), "https://sync.example.net");
    }

    #[test]
    fn a_replaced_value_shows_in_later_snapshots() {
        let shared = SharedSettings::new(SyncSettings::default());
        let enabled = SyncSettings {
            synchronization_enabled: true,
            fetch_live_changes: true,
            ..SyncSettings::default()
        };

        shared.replace(enabled.clone());

        assert_eq!(shared.snapshot(), enabled);
    }
}
