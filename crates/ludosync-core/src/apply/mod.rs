//! Application of remote changes to the local library
//!
//! Given a change envelope, the applier fetches the changed object from the
//! server and folds it into the store: create, update, or remove, with
//! identity collisions between independently created objects resolved by
//! reassigning references. Every store write made here is announced to the
//! grace registry first so it never echoes back out through the outbound
//! observer.
//!
//! The per-kind modules share one state machine shape; what varies is how an
//! object is located, which records can reference it, and whether it owns
//! binary attachments.

use std::sync::Arc;

use crate::library::{FileStore, LibraryStore};
use crate::models::{ChangeEnvelope, EntityId, NamedKind, ObjectType};
use crate::sync::GraceRegistry;
use crate::transport::SyncTransport;
use crate::{Error, Result};

mod attachments;
mod game;
mod named;
mod platform;
mod preset;

/// Applies fetched remote changes to the local library
#[derive(Clone)]
pub struct ChangeApplier {
    store: LibraryStore,
    files: FileStore,
    grace: GraceRegistry,
    transport: Arc<dyn SyncTransport>,
}

impl ChangeApplier {
    #[must_use]
    pub fn new(
        store: LibraryStore,
        files: FileStore,
        grace: GraceRegistry,
        transport: Arc<dyn SyncTransport>,
    ) -> Self {
        Self {
            store,
            files,
            grace,
            transport,
        }
    }

    /// Fetch the object behind `envelope` and fold it into the library.
    pub async fn apply(&self, envelope: &ChangeEnvelope) -> Result<()> {
        let object_id = envelope.object_id;
        match envelope.object_type {
            ObjectType::Platform => platform::apply_full(self, object_id).await,
            ObjectType::PlatformDiff => platform::apply_diff(self, object_id).await,
            ObjectType::Game => game::apply_full(self, object_id).await,
            ObjectType::GameDiff => game::apply_diff(self, object_id).await,
            ObjectType::FilterPreset => preset::apply(self, object_id).await,
            other => {
                let Some(kind) = NamedKind::from_object_type(other) else {
                    return Err(Error::InvalidInput(format!("no apply route for {other}")));
                };
                named::apply(self, kind, object_id).await
            }
        }
    }

    /// Whether any game or filter preset still references `id`
    fn is_referenced(&self, target: ObjectType, id: EntityId) -> bool {
        self.store
            .games()
            .iter()
            .any(|game| game.references(target, id))
            || self
                .store
                .filter_presets()
                .iter()
                .any(|preset| preset.references(target, id))
    }

    /// Rewrite every reference to `old` so it points at `new`, each write
    /// under its own grace registration.
    fn reassign_references(&self, target: ObjectType, old: EntityId, new: EntityId) -> Result<()> {
        for mut game in self.store.games() {
            if game.reassign(target, old, new) {
                tracing::info!(%target, game = %game.id, "rewriting reference from {old} to {new}");
                self.grace.suppress(ObjectType::Game, game.id);
                self.store.update_game(game)?;
            }
        }
        for mut preset in self.store.filter_presets() {
            if preset.reassign(target, old, new) {
                tracing::info!(%target, preset = %preset.id, "rewriting reference from {old} to {new}");
                self.grace.suppress(ObjectType::FilterPreset, preset.id);
                self.store.update_filter_preset(preset)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterPreset, FilterPresetSettings, Game, IdFilter, NamedItem};
    use crate::transport::testing::ScriptedTransport;
    use pretty_assertions::assert_eq;

    fn applier_with(transport: ScriptedTransport) -> (ChangeApplier, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let files = FileStore::open(dir.path().join("media")).unwrap();
        let applier = ChangeApplier::new(
            LibraryStore::open_in_memory(),
            files,
            GraceRegistry::new(),
            Arc::new(transport),
        );
        (applier, dir)
    }

    #[test]
    fn references_are_found_across_games_and_presets() {
        let (applier, _dir) = applier_with(ScriptedTransport::new());
        let genre = NamedItem::new("Strategy");
        applier.store.add_named(NamedKind::Genre, genre.clone());

        assert!(!applier.is_referenced(ObjectType::Genre, genre.id));

        let mut game = Game::new("Into the Breach");
        game.genre_ids = vec![genre.id];
        applier.store.add_game(game);
        assert!(applier.is_referenced(ObjectType::Genre, genre.id));
    }

    #[test]
    fn reassign_rewrites_under_grace() {
        let (applier, _dir) = applier_with(ScriptedTransport::new());
        let old = EntityId::new();
        let new = EntityId::new();

        let mut game = Game::new("Wingspan");
        game.tag_ids = vec![old];
        let game = applier.store.add_game(game);

        let mut preset = FilterPreset::new("Tagged");
        preset.settings = Some(FilterPresetSettings {
            tag: Some(IdFilter {
                ids: Some(vec![old]),
                text: None,
            }),
            ..FilterPresetSettings::default()
        });
        applier.store.add_filter_preset(preset.clone());

        applier
            .reassign_references(ObjectType::Tag, old, new)
            .unwrap();

        assert_eq!(applier.store.game(game.id).unwrap().tag_ids, vec![new]);
        assert!(applier
            .store
            .filter_preset(preset.id)
            .unwrap()
            .references(ObjectType::Tag, new));
        assert!(applier.grace.is_suppressed(ObjectType::Game, game.id));
        assert!(applier
            .grace
            .is_suppressed(ObjectType::FilterPreset, preset.id));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn envelopes_route_by_object_type() {
        let transport = ScriptedTransport::new();
        transport.put_named(
            NamedKind::Category,
            10,
            crate::models::NamedItemDto {
                id: EntityId::new(),
                name: Some("Indie".into()),
                removed: false,
                specification_id: None,
            },
        );
        let (applier, _dir) = applier_with(transport);

        let envelope = ChangeEnvelope {
            id: Some(1),
            object_type: ObjectType::Category,
            client_id: Some("someone-else".into()),
            object_id: 10,
            force_fetch: false,
        };
        applier.apply(&envelope).await.unwrap();
        assert_eq!(applier.store.list_named(NamedKind::Category).len(), 1);
    }
}
