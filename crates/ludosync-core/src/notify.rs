//! User-facing notifications
//!
//! The engine reports problems through a [`Notifier`] so an embedding
//! application can surface them however it likes; the default sink logs
//! through `tracing`. Ids are stable per category so repeated failures
//! coalesce instead of stacking.

/// Stable notification categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    /// The change stream or HTTP client could not be set up
    ClientError,
    /// A request to the sync backend failed
    HttpError,
    /// The server refused a change until a manual or forced fetch happens
    FetchRequired,
    /// Pushing a whole collection failed partway
    CollectionSaveError,
    /// Publishing a single live change failed
    LiveChangeSaveError,
}

impl NotificationCategory {
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::ClientError => "ludosync-client-error",
            Self::HttpError => "ludosync-http-error",
            Self::FetchRequired => "ludosync-fetch-required",
            Self::CollectionSaveError => "ludosync-collection-save-error",
            Self::LiveChangeSaveError => "ludosync-live-change-save-error",
        }
    }
}

/// Sink for user-facing problem reports
pub trait Notifier: Send + Sync {
    fn notify(&self, category: NotificationCategory, message: &str);
}

/// Default sink that forwards notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, category: NotificationCategory, message: &str) {
        tracing::error!(id = category.id(), "{message}");
    }
}
