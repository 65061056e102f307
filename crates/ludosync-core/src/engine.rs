//! Processing core: the change queue, its single consumer and the manual
//! sync operations.
//!
//! Every incoming envelope, streamed or fetched, funnels through
//! [`SyncEngine::process_change`]: changes originating from this client are
//! skipped unless `force_fetch` is set, everything else goes through the
//! apply state machine, and the watermark advances once the envelope is
//! dealt with. A failed application leaves the watermark behind so the
//! change is retried on the next catch-up.
//!
//! One processing lock serializes every path that mutates the library: the
//! queue consumer takes it per drained item, manual fetch operations hold it
//! for their whole run. Push operations never touch the local store and run
//! unlocked.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::apply::ChangeApplier;
use crate::diff::{
    game as game_wire, named as named_wire, platform as platform_wire, preset as preset_wire,
};
use crate::library::{FileStore, LibraryStore};
use crate::models::{ChangeEnvelope, EntityId, Game, GameChangeRequest, NamedKind};
use crate::notify::{NotificationCategory, Notifier};
use crate::outbound::{game_uploads, platform_uploads};
use crate::progress::Progress;
use crate::sync::{GraceRegistry, SharedSettings, Watermark};
use crate::transport::SyncTransport;
use crate::Result;

/// Collections are pushed parents-first so every reference a game carries
/// already exists server-side; platforms slot in after genres.
const NAMED_BEFORE_PLATFORMS: [NamedKind; 2] = [NamedKind::Category, NamedKind::Genre];
const NAMED_AFTER_PLATFORMS: [NamedKind; 8] = [
    NamedKind::Company,
    NamedKind::Feature,
    NamedKind::Tag,
    NamedKind::Series,
    NamedKind::AgeRating,
    NamedKind::Region,
    NamedKind::Source,
    NamedKind::CompletionStatus,
];

/// Front half of the processing core. Cheap to clone; every clone submits
/// into the same queue and shares the same processing lock.
#[derive(Clone)]
pub struct SyncEngine {
    applier: ChangeApplier,
    store: LibraryStore,
    files: FileStore,
    transport: Arc<dyn SyncTransport>,
    watermark: Watermark,
    settings: SharedSettings,
    notifier: Arc<dyn Notifier>,
    queue: mpsc::UnboundedSender<ChangeEnvelope>,
    processing: Arc<Mutex<()>>,
}

impl SyncEngine {
    /// Wire up an engine and the consumer that drains its queue. The
    /// consumer must be driven with [`QueueConsumer::run`] for submitted
    /// changes to be applied.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: LibraryStore,
        files: FileStore,
        grace: GraceRegistry,
        transport: Arc<dyn SyncTransport>,
        watermark: Watermark,
        settings: SharedSettings,
        notifier: Arc<dyn Notifier>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, QueueConsumer) {
        let (queue, receiver) = mpsc::unbounded_channel();
        let applier = ChangeApplier::new(
            store.clone(),
            files.clone(),
            grace,
            Arc::clone(&transport),
        );
        let engine = Self {
            applier,
            store,
            files,
            transport,
            watermark,
            settings,
            notifier,
            queue,
            processing: Arc::new(Mutex::new(())),
        };
        let consumer = QueueConsumer {
            engine: engine.clone(),
            receiver,
            shutdown,
        };
        (engine, consumer)
    }

    /// Queue one envelope for the background consumer.
    pub fn submit(&self, envelope: ChangeEnvelope) {
        if self.queue.send(envelope).is_err() {
            tracing::warn!("change queue is closed, dropping a change");
        }
    }

    /// The highest change id fully processed so far.
    #[must_use]
    pub fn last_processed(&self) -> i64 {
        self.watermark.last_processed()
    }

    /// Collection sizes, for status displays.
    #[must_use]
    pub fn counts(&self) -> crate::library::LibraryCounts {
        self.store.counts()
    }

    /// Probe the server's health endpoint.
    pub async fn check_connection(&self) -> Result<String> {
        self.transport.health().await
    }

    /// Catch up on missed changes at startup when the settings ask for it.
    /// Runs before the background loops so they start from a fresh watermark.
    pub async fn startup_fetch(&self, progress: &dyn Progress) -> Result<()> {
        let settings = self.settings.snapshot();
        if !settings.synchronization_enabled || !settings.fetch_changes_at_startup {
            return Ok(());
        }
        self.fetch_remaining(progress).await
    }

    /// Apply one envelope per the processing rule and advance the watermark.
    ///
    /// A change stamped with this client's id is an echo of a local write and
    /// is skipped unless the server flagged it `force_fetch`. The watermark
    /// advances for skipped changes too; it stays put when application fails.
    pub(crate) async fn process_change(&self, envelope: &ChangeEnvelope) -> Result<()> {
        let own = envelope.client_id.as_deref() == Some(self.transport.client_id());
        if envelope.force_fetch || !own {
            if let Err(error) = self.applier.apply(envelope).await {
                tracing::error!(
                    kind = %envelope.object_type,
                    object_id = envelope.object_id,
                    "applying a change failed: {error}"
                );
                return Err(error);
            }
        } else {
            tracing::trace!(
                kind = %envelope.object_type,
                object_id = envelope.object_id,
                "skipping a change from the current client"
            );
        }
        if let Some(id) = envelope.id {
            self.watermark.advance(id)?;
        }
        Ok(())
    }

    /// Fetch and apply the server's full change snapshot, then move the
    /// watermark to the highest sequence id the snapshot mentioned.
    pub async fn fetch_all(&self, progress: &dyn Progress) -> Result<()> {
        let _guard = self.processing.lock().await;
        let changes = self.transport.fetch_all_changes().await?;
        tracing::info!(count = changes.len(), "fetched the full change snapshot");
        self.apply_snapshot(&changes, progress).await
    }

    /// Fetch and apply changes for a selected set of games.
    pub async fn fetch_games(
        &self,
        request: &GameChangeRequest,
        progress: &dyn Progress,
    ) -> Result<()> {
        let _guard = self.processing.lock().await;
        let changes = self.transport.fetch_game_changes(request).await?;
        tracing::info!(count = changes.len(), "fetched changes for the selected games");
        self.apply_snapshot(&changes, progress).await
    }

    /// Fetch and apply every sequenced change after the watermark. An error
    /// stops the batch; changes already applied keep their watermark
    /// progress.
    pub async fn fetch_remaining(&self, progress: &dyn Progress) -> Result<()> {
        let _guard = self.processing.lock().await;
        let since = self.watermark.last_processed();
        let changes = self.transport.fetch_changes_since(since).await?;
        tracing::info!(count = changes.len(), since, "fetching changes since the watermark");
        progress.begin(changes.len() as u64);
        for envelope in &changes {
            if progress.is_cancelled() {
                tracing::info!("fetch cancelled");
                break;
            }
            progress.step(&describe(envelope));
            self.process_change(envelope).await?;
        }
        Ok(())
    }

    async fn apply_snapshot(
        &self,
        changes: &[ChangeEnvelope],
        progress: &dyn Progress,
    ) -> Result<()> {
        progress.begin(changes.len() as u64);
        let mut max_id = self.watermark.last_processed();
        for envelope in changes {
            if progress.is_cancelled() {
                tracing::info!("fetch cancelled");
                break;
            }
            progress.step(&describe(envelope));
            self.process_change(envelope).await?;
            if let Some(id) = envelope.id {
                max_id = max_id.max(id);
            }
        }
        self.watermark.advance(max_id)?;
        Ok(())
    }

    /// Push the whole library to the server, collection by collection.
    pub async fn push_all(&self, progress: &dyn Progress) -> Result<()> {
        let result = self.push_all_inner(progress).await;
        if let Err(error) = &result {
            self.notifier.notify(
                NotificationCategory::CollectionSaveError,
                &format!("pushing the library failed: {error}"),
            );
        }
        result
    }

    async fn push_all_inner(&self, progress: &dyn Progress) -> Result<()> {
        let counts = self.store.counts();
        let named_total: usize = counts.named.iter().map(|(_, count)| count).sum();
        let total = named_total + counts.platforms + counts.filter_presets + counts.games;
        progress.begin(total as u64);
        tracing::info!(total, "pushing the whole library");

        for kind in NAMED_BEFORE_PLATFORMS {
            self.push_named_collection(kind, progress).await?;
        }
        self.push_platforms(progress).await?;
        for kind in NAMED_AFTER_PLATFORMS {
            self.push_named_collection(kind, progress).await?;
        }
        self.push_presets(progress).await?;
        self.push_game_list(self.store.games(), progress).await
    }

    /// Push the selected games as full saves.
    pub async fn push_games(&self, ids: &[EntityId], progress: &dyn Progress) -> Result<()> {
        let games: Vec<Game> = self
            .store
            .games()
            .into_iter()
            .filter(|game| ids.contains(&game.id))
            .collect();
        progress.begin(games.len() as u64);
        let result = self.push_game_list(games, progress).await;
        if let Err(error) = &result {
            self.notifier.notify(
                NotificationCategory::CollectionSaveError,
                &format!("pushing the selected games failed: {error}"),
            );
        }
        result
    }

    async fn push_named_collection(
        &self,
        kind: NamedKind,
        progress: &dyn Progress,
    ) -> Result<()> {
        let mut items = self.store.list_named(kind);
        items.sort_by(|a, b| a.name.cmp(&b.name));
        for item in items {
            if progress.is_cancelled() {
                return Ok(());
            }
            progress.step(&format!("{kind} {}", item.name));
            self.transport
                .save_named(kind, &named_wire::to_dto(&item))
                .await?;
        }
        Ok(())
    }

    async fn push_platforms(&self, progress: &dyn Progress) -> Result<()> {
        let mut platforms = self.store.platforms();
        platforms.sort_by(|a, b| a.name.cmp(&b.name));
        for platform in platforms {
            if progress.is_cancelled() {
                return Ok(());
            }
            progress.step(&format!("platform {}", platform.name));
            let files = platform_uploads(&self.files, &platform)?;
            self.transport
                .save_platform(&platform_wire::to_dto(&platform), files)
                .await?;
        }
        Ok(())
    }

    async fn push_presets(&self, progress: &dyn Progress) -> Result<()> {
        let mut presets = self.store.filter_presets();
        presets.sort_by(|a, b| a.name.cmp(&b.name));
        for preset in presets {
            if progress.is_cancelled() {
                return Ok(());
            }
            progress.step(&format!("filter preset {}", preset.name));
            self.transport
                .save_filter_preset(&preset_wire::to_dto(&preset))
                .await?;
        }
        Ok(())
    }

    async fn push_game_list(&self, mut games: Vec<Game>, progress: &dyn Progress) -> Result<()> {
        games.sort_by(|a, b| {
            a.added
                .cmp(&b.added)
                .then_with(|| a.modified.cmp(&b.modified))
                .then_with(|| a.name.cmp(&b.name))
        });
        for game in games {
            if progress.is_cancelled() {
                return Ok(());
            }
            progress.step(&format!("game {}", game.name));
            let files = game_uploads(&self.files, &game)?;
            self.transport
                .save_game(&game_wire::to_dto(&game, &self.store), files)
                .await?;
        }
        Ok(())
    }
}

/// Single consumer of the change queue. Applies queued envelopes strictly in
/// arrival order, taking the processing lock per item so manual operations
/// never interleave with it.
pub struct QueueConsumer {
    engine: SyncEngine,
    receiver: mpsc::UnboundedReceiver<ChangeEnvelope>,
    shutdown: watch::Receiver<bool>,
}

impl QueueConsumer {
    /// Drain the queue until shutdown. Envelopes already queued when the
    /// signal arrives are still processed.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                envelope = self.receiver.recv() => {
                    let Some(envelope) = envelope else { break };
                    let _guard = self.engine.processing.lock().await;
                    if let Err(error) = self.engine.process_change(&envelope).await {
                        tracing::warn!(
                            object_id = envelope.object_id,
                            "change left unprocessed: {error}"
                        );
                    }
                }
                _ = self.shutdown.changed() => break,
            }
        }
        tracing::debug!("change queue consumer stopped");
    }
}

fn describe(envelope: &ChangeEnvelope) -> String {
    format!("{} {}", envelope.object_type, envelope.object_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::named as wire;
    use crate::models::{NamedItem, ObjectType, Platform};
    use crate::notify::LogNotifier;
    use crate::progress::LogProgress;
    use crate::sync::SyncSettings;
    use crate::transport::testing::{Outbound, ScriptedTransport};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Fixture {
        engine: SyncEngine,
        consumer: QueueConsumer,
        transport: Arc<ScriptedTransport>,
        shutdown: watch::Sender<bool>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        fixture_with_settings(SyncSettings {
            synchronization_enabled: true,
            ..SyncSettings::default()
        })
    }

    fn fixture_with_settings(settings: SyncSettings) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (engine, consumer) = SyncEngine::new(
            LibraryStore::open_in_memory(),
            FileStore::open(dir.path().join("media")).unwrap(),
            GraceRegistry::new(),
            Arc::clone(&transport) as Arc<dyn SyncTransport>,
            Watermark::open_in_memory(),
            SharedSettings::new(settings),
            Arc::new(LogNotifier),
            shutdown_rx,
        );
        Fixture {
            engine,
            consumer,
            transport,
            shutdown,
            _dir: dir,
        }
    }

    fn envelope(id: Option<i64>, object_id: i64, client: &str) -> ChangeEnvelope {
        ChangeEnvelope {
            id,
            object_type: ObjectType::Category,
            client_id: Some(client.into()),
            object_id,
            force_fetch: false,
        }
    }

    fn seeded_category(transport: &ScriptedTransport, object_id: i64, name: &str) -> NamedItem {
        let item = NamedItem::new(name);
        transport.put_named(NamedKind::Category, object_id, wire::to_dto(&item));
        item
    }

    #[tokio::test(flavor = "current_thread")]
    async fn own_changes_are_skipped_but_advance_the_watermark() {
        let fixture = fixture();
        // no seed behind object 10: applying instead of skipping would 404
        fixture
            .transport
            .set_sequenced_changes(vec![envelope(Some(7), 10, "self")]);

        fixture.engine.fetch_remaining(&LogProgress).await.unwrap();

        assert_eq!(fixture.engine.last_processed(), 7);
        assert!(fixture.engine.store.list_named(NamedKind::Category).is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn force_fetch_overrides_the_own_client_skip() {
        let fixture = fixture();
        let item = seeded_category(&fixture.transport, 10, "Indie");
        let mut own = envelope(Some(3), 10, "self");
        own.force_fetch = true;
        fixture.transport.set_sequenced_changes(vec![own]);

        fixture.engine.fetch_remaining(&LogProgress).await.unwrap();

        assert!(fixture
            .engine
            .store
            .named(NamedKind::Category, item.id)
            .is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn a_failed_change_stops_the_batch_and_keeps_the_watermark() {
        let fixture = fixture();
        let first = seeded_category(&fixture.transport, 10, "Indie");
        // object 11 is not seeded, fetching it fails
        let third = NamedItem::new("Strategy");
        fixture
            .transport
            .put_named(NamedKind::Category, 12, wire::to_dto(&third));
        fixture.transport.set_sequenced_changes(vec![
            envelope(Some(1), 10, "peer"),
            envelope(Some(2), 11, "peer"),
            envelope(Some(3), 12, "peer"),
        ]);

        let result = fixture.engine.fetch_remaining(&LogProgress).await;

        assert!(result.is_err());
        assert_eq!(fixture.engine.last_processed(), 1);
        assert!(fixture
            .engine
            .store
            .named(NamedKind::Category, first.id)
            .is_some());
        assert!(fixture
            .engine
            .store
            .named(NamedKind::Category, third.id)
            .is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fetch_all_advances_to_the_batch_maximum() {
        let fixture = fixture();
        seeded_category(&fixture.transport, 10, "Indie");
        seeded_category(&fixture.transport, 11, "Strategy");
        fixture
            .transport
            .set_all_changes(vec![envelope(Some(9), 10, "peer"), envelope(None, 11, "peer")]);

        fixture.engine.fetch_all(&LogProgress).await.unwrap();

        assert_eq!(fixture.engine.last_processed(), 9);
        assert_eq!(fixture.engine.store.list_named(NamedKind::Category).len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn queued_changes_are_drained_before_shutdown() {
        let fixture = fixture();
        let item = seeded_category(&fixture.transport, 10, "Indie");
        fixture.engine.submit(envelope(Some(4), 10, "peer"));
        let mut renamed = wire::to_dto(&item);
        renamed.name = Some("Indie games".into());
        fixture.transport.put_named(NamedKind::Category, 10, renamed);
        fixture.engine.submit(envelope(Some(5), 10, "peer"));

        // the signal is already set when run() starts; queued items win anyway
        fixture.shutdown.send(true).unwrap();
        fixture.consumer.run().await;

        let stored = fixture
            .engine
            .store
            .named(NamedKind::Category, item.id)
            .unwrap();
        assert_eq!(stored.name, "Indie games");
        assert_eq!(fixture.engine.last_processed(), 5);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn startup_fetch_respects_the_settings() {
        let fixture = fixture_with_settings(SyncSettings {
            synchronization_enabled: true,
            fetch_changes_at_startup: false,
            ..SyncSettings::default()
        });
        fixture
            .transport
            .set_sequenced_changes(vec![envelope(Some(7), 10, "peer")]);

        fixture.engine.startup_fetch(&LogProgress).await.unwrap();
        assert_eq!(fixture.engine.last_processed(), 0);

        let fixture = fixture_with_settings(SyncSettings {
            synchronization_enabled: true,
            fetch_changes_at_startup: true,
            ..SyncSettings::default()
        });
        seeded_category(&fixture.transport, 10, "Indie");
        fixture
            .transport
            .set_sequenced_changes(vec![envelope(Some(7), 10, "peer")]);

        fixture.engine.startup_fetch(&LogProgress).await.unwrap();
        assert_eq!(fixture.engine.last_processed(), 7);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn push_all_walks_the_collections_in_dependency_order() {
        let fixture = fixture();
        fixture
            .engine
            .store
            .add_named(NamedKind::Category, NamedItem::new("Indie"));
        fixture.engine.store.add_platform(Platform::new("PC"));
        fixture
            .engine
            .store
            .add_filter_preset(crate::models::FilterPreset::new("Backlog"));
        fixture.engine.store.add_game(Game::new("Factorio"));

        fixture.engine.push_all(&LogProgress).await.unwrap();

        let kinds: Vec<&str> = fixture
            .transport
            .sent()
            .iter()
            .map(|outbound| match outbound {
                Outbound::SaveNamed(..) => "named",
                Outbound::SavePlatform(..) => "platform",
                Outbound::SavePreset(..) => "preset",
                Outbound::SaveGame(..) => "game",
                other => panic!("unexpected outbound {other:?}"),
            })
            .collect();
        assert_eq!(kinds, vec!["named", "platform", "preset", "game"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn push_games_only_sends_the_selection() {
        let fixture = fixture();
        let kept = fixture.engine.store.add_game(Game::new("Factorio"));
        fixture.engine.store.add_game(Game::new("Celeste"));

        fixture
            .engine
            .push_games(&[kept.id], &LogProgress)
            .await
            .unwrap();

        let sent = fixture.transport.sent();
        let [Outbound::SaveGame(dto, _)] = sent.as_slice() else {
            panic!("expected one game save, got {sent:?}");
        };
        assert_eq!(dto.id, kept.id);
    }

    struct CancelAfter {
        steps: AtomicU64,
        limit: u64,
    }

    impl Progress for CancelAfter {
        fn begin(&self, _total: u64) {}

        fn step(&self, _detail: &str) {
            self.steps.fetch_add(1, Ordering::SeqCst);
        }

        fn is_cancelled(&self) -> bool {
            self.steps.load(Ordering::SeqCst) >= self.limit
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn a_cancelled_push_stops_at_the_item_boundary() {
        let fixture = fixture();
        for name in ["Action", "Indie", "Strategy"] {
            fixture
                .engine
                .store
                .add_named(NamedKind::Category, NamedItem::new(name));
        }

        let progress = CancelAfter {
            steps: AtomicU64::new(0),
            limit: 1,
        };
        fixture.engine.push_all(&progress).await.unwrap();

        assert_eq!(fixture.transport.sent().len(), 1);
    }
}
