//! Live publication of local changes
//!
//! An observer on the library store forwards mutation events into a worker
//! task that turns them into transport saves and deletes. The forwarder runs
//! synchronously inside the store event and applies the cheap gates there:
//! nothing is forwarded while live-change sending is off, and identities the
//! engine just wrote (grace-suppressed) are dropped as echoes. The worker
//! owns the slow parts: equality filtering, DTO building, attachment reads
//! and the network calls.
//!
//! Updates to platforms and games go out as diffs. A diff save the server
//! rejects with `manualSyncRequired` is retried exactly once as a full save.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::diff::{
    game as game_wire, named as named_wire, platform as platform_wire, preset as preset_wire,
};
use crate::library::{FileStore, LibraryRecord, LibraryStore, Observer, StoreEvent};
use crate::models::{AttachmentKind, Game, Platform};
use crate::notify::{NotificationCategory, Notifier};
use crate::sync::{GraceRegistry, SharedSettings};
use crate::transport::{AttachmentUpload, SyncTransport};
use crate::{Error, Result};

/// Worker half of the outbound pipeline. Create with [`OutboundSync::start`],
/// then drive it with [`OutboundSync::run`] on the runtime.
pub struct OutboundSync {
    store: LibraryStore,
    files: FileStore,
    transport: Arc<dyn SyncTransport>,
    notifier: Arc<dyn Notifier>,
    events: mpsc::UnboundedReceiver<StoreEvent>,
    shutdown: watch::Receiver<bool>,
}

impl OutboundSync {
    /// Subscribe to the store and return the worker that publishes the
    /// forwarded events.
    pub fn start(
        store: LibraryStore,
        files: FileStore,
        grace: GraceRegistry,
        transport: Arc<dyn SyncTransport>,
        settings: SharedSettings,
        notifier: Arc<dyn Notifier>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        let forwarder: Observer = Arc::new(move |event: &StoreEvent| {
            if !settings.snapshot().send_live_changes {
                return;
            }
            let record = event.record();
            if grace.is_suppressed(record.object_type(), record.id()) {
                tracing::trace!(
                    kind = %record.object_type(),
                    id = %record.id(),
                    "not republishing an applied change"
                );
                return;
            }
            let _ = sender.send(event.clone());
        });
        store.observe(forwarder);
        Self {
            store,
            files,
            transport,
            notifier,
            events,
            shutdown,
        }
    }

    /// Publish forwarded events until shutdown. Events already queued when
    /// the shutdown signal arrives are still published.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    self.publish(event).await;
                }
                _ = self.shutdown.changed() => break,
            }
        }
        tracing::debug!("outbound dispatch stopped");
    }

    async fn publish(&self, event: StoreEvent) {
        let result = match event {
            StoreEvent::Added(record) => self.publish_add(record).await,
            StoreEvent::Updated { old, new } => self.publish_update(old, new).await,
            StoreEvent::Removed(record) => self.publish_remove(record).await,
        };
        if let Err(error) = result {
            tracing::warn!("publishing a live change failed: {error}");
            if matches!(error, Error::ForceFetchRequired) {
                self.notifier.notify(
                    NotificationCategory::FetchRequired,
                    "the server requires a full fetch before it accepts further changes",
                );
            } else {
                self.notifier.notify(
                    NotificationCategory::LiveChangeSaveError,
                    &format!("publishing a live change failed: {error}"),
                );
            }
        }
    }

    async fn publish_add(&self, record: LibraryRecord) -> Result<()> {
        match record {
            LibraryRecord::Named(kind, item) => {
                self.transport
                    .save_named(kind, &named_wire::to_dto(&item))
                    .await
            }
            LibraryRecord::Platform(platform) => {
                let files = platform_uploads(&self.files, &platform)?;
                self.transport
                    .save_platform(&platform_wire::to_dto(&platform), files)
                    .await
            }
            LibraryRecord::Game(game) => {
                let files = game_uploads(&self.files, &game)?;
                self.transport
                    .save_game(&game_wire::to_dto(&game, &self.store), files)
                    .await
            }
            LibraryRecord::FilterPreset(preset) => {
                self.transport
                    .save_filter_preset(&preset_wire::to_dto(&preset))
                    .await
            }
        }
    }

    async fn publish_update(&self, old: LibraryRecord, new: LibraryRecord) -> Result<()> {
        match (old, new) {
            (LibraryRecord::Named(kind, old), LibraryRecord::Named(_, new)) => {
                if old == new {
                    tracing::trace!(%kind, id = %new.id, "update changed nothing, not publishing");
                    return Ok(());
                }
                self.transport
                    .save_named(kind, &named_wire::to_dto(&new))
                    .await
            }
            (LibraryRecord::Platform(old), LibraryRecord::Platform(new)) => {
                let diff = platform_wire::compute_diff(&old, &new);
                if diff.changed_fields.is_empty() {
                    tracing::trace!(id = %new.id, "update changed nothing, not publishing");
                    return Ok(());
                }
                let files = platform_uploads(&self.files, &new)?;
                let changed = changed_only(&files, &diff.changed_fields);
                match self.transport.save_platform_diff(&diff, changed).await {
                    Err(error) if error.is_manual_sync_required() => {
                        tracing::info!(id = %new.id, "server wants the full platform, downgrading the diff");
                        self.transport
                            .save_platform(&platform_wire::to_dto(&new), files)
                            .await
                    }
                    other => other,
                }
            }
            (LibraryRecord::Game(old), LibraryRecord::Game(new)) => {
                let diff = game_wire::compute_diff(&old, &new, &self.store);
                if diff.changed_fields.is_empty() {
                    tracing::trace!(id = %new.id, "update changed nothing, not publishing");
                    return Ok(());
                }
                let files = game_uploads(&self.files, &new)?;
                let changed = changed_only(&files, &diff.changed_fields);
                match self.transport.save_game_diff(&diff, changed).await {
                    Err(error) if error.is_manual_sync_required() => {
                        tracing::info!(id = %new.id, "server wants the full game, downgrading the diff");
                        self.transport
                            .save_game(&game_wire::to_dto(&new, &self.store), files)
                            .await
                    }
                    other => other,
                }
            }
            (LibraryRecord::FilterPreset(old), LibraryRecord::FilterPreset(new)) => {
                if preset_wire::to_dto(&old) == preset_wire::to_dto(&new) {
                    tracing::trace!(id = %new.id, "update changed nothing, not publishing");
                    return Ok(());
                }
                self.transport
                    .save_filter_preset(&preset_wire::to_dto(&new))
                    .await
            }
            (_, new) => {
                tracing::error!(id = %new.id(), "update event with mismatched record kinds");
                Ok(())
            }
        }
    }

    async fn publish_remove(&self, record: LibraryRecord) -> Result<()> {
        match record {
            LibraryRecord::Named(kind, item) => {
                self.transport
                    .delete_named(kind, &named_wire::to_dto(&item))
                    .await
            }
            LibraryRecord::Platform(platform) => {
                self.transport
                    .delete_platform(&platform_wire::to_dto(&platform))
                    .await
            }
            LibraryRecord::Game(game) => {
                self.transport
                    .delete_game(&game_wire::to_dto(&game, &self.store))
                    .await
            }
            LibraryRecord::FilterPreset(preset) => {
                self.transport
                    .delete_filter_preset(&preset_wire::to_dto(&preset))
                    .await
            }
        }
    }
}

/// Read every populated attachment slot of a platform into upload parts
pub(crate) fn platform_uploads(
    files: &FileStore,
    platform: &Platform,
) -> Result<Vec<AttachmentUpload>> {
    let mut uploads = Vec::new();
    for kind in AttachmentKind::ALL {
        if let Some(handle) = platform.attachment(kind) {
            uploads.push(AttachmentUpload::from_handle(
                kind,
                handle,
                files.read(handle)?,
            ));
        }
    }
    Ok(uploads)
}

/// Read every populated attachment slot of a game into upload parts
pub(crate) fn game_uploads(files: &FileStore, game: &Game) -> Result<Vec<AttachmentUpload>> {
    let mut uploads = Vec::new();
    for kind in AttachmentKind::ALL {
        if let Some(handle) = game.attachment(kind) {
            uploads.push(AttachmentUpload::from_handle(
                kind,
                handle,
                files.read(handle)?,
            ));
        }
    }
    Ok(uploads)
}

fn changed_only(files: &[AttachmentUpload], changed_fields: &[String]) -> Vec<AttachmentUpload> {
    files
        .iter()
        .filter(|upload| {
            changed_fields
                .iter()
                .any(|name| name == upload.kind.field_name())
        })
        .cloned()
        .collect()
}
