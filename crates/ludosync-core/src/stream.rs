//! Live change stream consumer.
//!
//! Holds one long-lived connection to the server's change stream, parsing
//! every `data:` line into a change envelope and queueing it on the engine.
//! Any session failure is logged and the loop reconnects after a short
//! backoff; a cleanly ended stream reconnects immediately. While the
//! settings keep live fetching off the loop idles, rechecking periodically
//! so a settings change picks it back up without a restart.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;

use crate::engine::SyncEngine;
use crate::models::ChangeEnvelope;
use crate::sync::SharedSettings;
use crate::transport::{ChangeStream, SyncTransport};

const PREREQUISITE_RECHECK: Duration = Duration::from_secs(10);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const KEEPALIVE_PAUSE: Duration = Duration::from_secs(1);
const DATA_PREFIX: &str = "data:";

/// Background consumer of the server's live change stream.
pub struct ChangeStreamLoop {
    engine: SyncEngine,
    transport: Arc<dyn SyncTransport>,
    settings: SharedSettings,
    shutdown: watch::Receiver<bool>,
}

impl ChangeStreamLoop {
    #[must_use]
    pub fn new(
        engine: SyncEngine,
        transport: Arc<dyn SyncTransport>,
        settings: SharedSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            transport,
            settings,
            shutdown,
        }
    }

    /// Connect, read and reconnect until shutdown.
    pub async fn run(mut self) {
        loop {
            let settings = self.settings.snapshot();
            if !settings.synchronization_enabled || !settings.fetch_live_changes {
                if self.pause(PREREQUISITE_RECHECK).await {
                    break;
                }
                continue;
            }
            let since = self.engine.last_processed();
            let mut stream = match self.transport.open_change_stream(since).await {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::warn!(since, "opening the change stream failed: {error}");
                    if self.pause(RECONNECT_BACKOFF).await {
                        break;
                    }
                    continue;
                }
            };
            tracing::info!(since, "change stream connected");
            if self.consume(&mut stream).await {
                break;
            }
        }
        tracing::debug!("change stream loop stopped");
    }

    /// Read one session to its end. Returns whether shutdown was requested.
    async fn consume(&mut self, stream: &mut ChangeStream) -> bool {
        loop {
            tokio::select! {
                line = stream.next() => match line {
                    Some(Ok(line)) => {
                        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                            continue;
                        };
                        match serde_json::from_str::<Option<ChangeEnvelope>>(payload.trim()) {
                            Ok(Some(envelope)) => self.engine.submit(envelope),
                            Ok(None) => {
                                // server keepalive
                                if self.pause(KEEPALIVE_PAUSE).await {
                                    return true;
                                }
                            }
                            Err(error) => {
                                tracing::warn!("unreadable stream line: {error}");
                                return self.pause(RECONNECT_BACKOFF).await;
                            }
                        }
                    }
                    Some(Err(error)) => {
                        tracing::warn!("change stream failed: {error}");
                        return self.pause(RECONNECT_BACKOFF).await;
                    }
                    None => {
                        tracing::info!("change stream ended, reconnecting");
                        return false;
                    }
                },
                _ = self.shutdown.changed() => return true,
            }
        }
    }

    /// Wait out `duration`. Returns early with true when shutdown fires.
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(duration) => false,
            _ = self.shutdown.changed() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::named as wire;
    use crate::engine::QueueConsumer;
    use crate::library::{FileStore, LibraryStore};
    use crate::models::{EntityId, NamedItem, NamedKind};
    use crate::notify::LogNotifier;
    use crate::sync::{GraceRegistry, SyncSettings, Watermark};
    use crate::transport::testing::ScriptedTransport;
    use pretty_assertions::assert_eq;

    struct Fixture {
        store: LibraryStore,
        engine: SyncEngine,
        consumer: QueueConsumer,
        stream: ChangeStreamLoop,
        transport: Arc<ScriptedTransport>,
        shutdown: watch::Sender<bool>,
        _dir: tempfile::TempDir,
    }

    fn fixture(fetch_live_changes: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::open_in_memory();
        let transport = Arc::new(ScriptedTransport::new());
        let settings = SharedSettings::new(SyncSettings {
            synchronization_enabled: true,
            fetch_live_changes,
            ..SyncSettings::default()
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (engine, consumer) = SyncEngine::new(
            store.clone(),
            FileStore::open(dir.path().join("media")).unwrap(),
            GraceRegistry::new(),
            Arc::clone(&transport) as Arc<dyn SyncTransport>,
            Watermark::open_in_memory(),
            settings.clone(),
            Arc::new(LogNotifier),
            shutdown_rx.clone(),
        );
        let stream = ChangeStreamLoop::new(
            engine.clone(),
            Arc::clone(&transport) as Arc<dyn SyncTransport>,
            settings,
            shutdown_rx,
        );
        Fixture {
            store,
            engine,
            consumer,
            stream,
            transport,
            shutdown,
            _dir: dir,
        }
    }

    fn data_line(id: i64, object_id: i64) -> String {
        format!(
            r#"data:{{"id":{id},"type":"Category","clientId":"peer","objectId":{object_id},"forceFetch":false}}"#
        )
    }

    async fn wait_for_category(store: &LibraryStore, id: EntityId) {
        for _ in 0..1000 {
            if store.named(NamedKind::Category, id).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("the streamed change was never applied");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn streamed_changes_land_in_the_library() {
        let fixture = fixture(true);
        let item = NamedItem::new("Indie");
        fixture
            .transport
            .put_named(NamedKind::Category, 10, wire::to_dto(&item));
        fixture.transport.push_stream_session(vec![
            Ok(":comment".into()),
            Ok("data: null".into()),
            Ok(data_line(4, 10)),
        ]);

        let consumer = tokio::spawn(fixture.consumer.run());
        let stream = tokio::spawn(fixture.stream.run());
        wait_for_category(&fixture.store, item.id).await;
        fixture.shutdown.send(true).unwrap();
        consumer.await.unwrap();
        stream.await.unwrap();

        assert_eq!(fixture.engine.last_processed(), 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn nothing_connects_while_live_fetching_is_off() {
        let fixture = fixture(false);
        fixture
            .transport
            .push_stream_session(vec![Ok(data_line(1, 10))]);

        fixture.shutdown.send(true).unwrap();
        fixture.stream.run().await;

        assert_eq!(fixture.transport.remaining_stream_sessions(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn an_unreadable_line_abandons_the_session() {
        let fixture = fixture(true);
        let item = NamedItem::new("Indie");
        fixture
            .transport
            .put_named(NamedKind::Category, 10, wire::to_dto(&item));
        // the valid line behind the broken one must never be submitted
        fixture.transport.push_stream_session(vec![
            Ok("data:not json".into()),
            Ok(data_line(9, 10)),
        ]);
        fixture
            .transport
            .push_stream_session(vec![Ok(data_line(4, 10))]);

        let consumer = tokio::spawn(fixture.consumer.run());
        let stream = tokio::spawn(fixture.stream.run());
        wait_for_category(&fixture.store, item.id).await;
        fixture.shutdown.send(true).unwrap();
        consumer.await.unwrap();
        stream.await.unwrap();

        assert_eq!(fixture.engine.last_processed(), 4);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn a_finished_stream_reconnects() {
        let fixture = fixture(true);
        let first = NamedItem::new("Indie");
        let second = NamedItem::new("Strategy");
        fixture
            .transport
            .put_named(NamedKind::Category, 10, wire::to_dto(&first));
        fixture
            .transport
            .put_named(NamedKind::Category, 11, wire::to_dto(&second));
        fixture
            .transport
            .push_stream_session(vec![Ok(data_line(1, 10))]);
        fixture
            .transport
            .push_stream_session(vec![Ok(data_line(2, 11))]);

        let consumer = tokio::spawn(fixture.consumer.run());
        let stream = tokio::spawn(fixture.stream.run());
        wait_for_category(&fixture.store, second.id).await;
        fixture.shutdown.send(true).unwrap();
        consumer.await.unwrap();
        stream.await.unwrap();

        assert!(fixture.store.named(NamedKind::Category, first.id).is_some());
        assert_eq!(fixture.engine.last_processed(), 2);
    }
}
