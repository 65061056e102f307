//! Apply path for the plain named kinds

use crate::diff::named as wire;
use crate::models::{NamedItem, NamedItemDto, NamedKind};
use crate::Result;

use super::ChangeApplier;

pub(super) async fn apply(applier: &ChangeApplier, kind: NamedKind, object_id: i64) -> Result<()> {
    let dto = applier.transport.fetch_named(kind, object_id).await?;
    if dto.removed {
        remove(applier, kind, &dto)
    } else {
        save(applier, kind, &dto)
    }
}

fn save(applier: &ChangeApplier, kind: NamedKind, dto: &NamedItemDto) -> Result<()> {
    let target = kind.object_type();
    let name = dto.name.as_deref().unwrap_or_default();
    let (mut item, is_new, reassign_from) = match applier.store.named(kind, dto.id) {
        Some(found) => (found, false, None),
        None => (
            NamedItem::new(""),
            true,
            applier.store.named_by_name(kind, name),
        ),
    };

    let changed = is_new || wire::differs(&item, dto);
    wire::fill(&mut item, dto);
    if !changed {
        tracing::debug!(%target, id = %item.id, "unchanged, skipping");
        return Ok(());
    }

    applier.grace.suppress(target, item.id);
    if is_new {
        tracing::info!(%target, id = %item.id, "saving new {}", item.name);
        applier.store.add_named(kind, item.clone());
    } else {
        tracing::info!(%target, id = %item.id, "saving {}", item.name);
        applier.store.update_named(kind, item.clone())?;
    }

    if let Some(old) = reassign_from {
        tracing::info!(%target, "reassigning {} to {}", old.id, item.id);
        applier.reassign_references(target, old.id, item.id)?;
        applier.grace.suppress(target, old.id);
        applier.store.remove_named(kind, old.id);
    }
    Ok(())
}

fn remove(applier: &ChangeApplier, kind: NamedKind, dto: &NamedItemDto) -> Result<()> {
    let target = kind.object_type();
    if applier.is_referenced(target, dto.id) {
        tracing::info!(%target, id = %dto.id, "still referenced, cannot remove");
        return Ok(());
    }

    // only a full identity and name match is removed
    let name = dto.name.as_deref().unwrap_or_default();
    let matched = applier
        .store
        .named(kind, dto.id)
        .filter(|item| item.name == name);
    applier.grace.suppress(target, dto.id);
    if let Some(item) = matched {
        tracing::info!(%target, id = %item.id, "removing {}", item.name);
        applier.store.remove_named(kind, item.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{FileStore, LibraryStore, StoreEvent};
    use crate::models::{
        ChangeEnvelope, EntityId, FilterPreset, FilterPresetSettings, Game, IdFilter, ObjectType,
    };
    use crate::sync::GraceRegistry;
    use crate::transport::testing::ScriptedTransport;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

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

    fn envelope(object_type: ObjectType, object_id: i64) -> ChangeEnvelope {
        ChangeEnvelope {
            id: Some(1),
            object_type,
            client_id: Some("peer".into()),
            object_id,
            force_fetch: false,
        }
    }

    fn dto(id: EntityId, name: &str) -> NamedItemDto {
        NamedItemDto {
            id,
            name: Some(name.into()),
            removed: false,
            specification_id: None,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn a_new_item_is_created_under_grace() {
        let id = EntityId::new();
        let transport = ScriptedTransport::new();
        transport.put_named(NamedKind::Category, 10, dto(id, "Indie"));
        let (applier, _dir) = applier_with(transport);

        applier
            .apply(&envelope(ObjectType::Category, 10))
            .await
            .unwrap();

        let stored = applier.store.named(NamedKind::Category, id).unwrap();
        assert_eq!(stored.name, "Indie");
        assert!(applier.grace.is_suppressed(ObjectType::Category, id));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn an_unchanged_item_is_skipped_without_writes() {
        let item = NamedItem::new("Indie");
        let transport = ScriptedTransport::new();
        transport.put_named(NamedKind::Genre, 5, wire::to_dto(&item));
        let (applier, _dir) = applier_with(transport);
        applier.store.add_named(NamedKind::Genre, item.clone());

        let writes = Arc::new(Mutex::new(0_usize));
        let counter = Arc::clone(&writes);
        applier
            .store
            .observe(Arc::new(move |_event: &StoreEvent| {
                *counter.lock().unwrap() += 1;
            }));

        applier
            .apply(&envelope(ObjectType::Genre, 5))
            .await
            .unwrap();

        assert_eq!(*writes.lock().unwrap(), 0);
        assert!(!applier.grace.is_suppressed(ObjectType::Genre, item.id));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn a_name_collision_migrates_references_to_the_incoming_identity() {
        let incoming = EntityId::new();
        let transport = ScriptedTransport::new();
        transport.put_named(NamedKind::Category, 10, dto(incoming, "Backlog"));
        let (applier, _dir) = applier_with(transport);

        let local = NamedItem::new("Backlog");
        applier.store.add_named(NamedKind::Category, local.clone());
        let mut game = Game::new("Outer Wilds");
        game.category_ids = vec![local.id];
        let game = applier.store.add_game(game);
        let mut preset = FilterPreset::new("By category");
        preset.settings = Some(FilterPresetSettings {
            category: Some(IdFilter {
                ids: Some(vec![local.id]),
                text: None,
            }),
            ..FilterPresetSettings::default()
        });
        applier.store.add_filter_preset(preset.clone());

        applier
            .apply(&envelope(ObjectType::Category, 10))
            .await
            .unwrap();

        assert!(applier.store.named(NamedKind::Category, local.id).is_none());
        assert_eq!(
            applier
                .store
                .named(NamedKind::Category, incoming)
                .unwrap()
                .name,
            "Backlog"
        );
        assert_eq!(
            applier.store.game(game.id).unwrap().category_ids,
            vec![incoming]
        );
        assert!(applier
            .store
            .filter_preset(preset.id)
            .unwrap()
            .references(ObjectType::Category, incoming));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn a_referenced_item_survives_its_removal_notice() {
        let item = NamedItem::new("co-op");
        let mut removal = wire::to_dto(&item);
        removal.removed = true;
        let transport = ScriptedTransport::new();
        transport.put_named(NamedKind::Tag, 3, removal);
        let (applier, _dir) = applier_with(transport);

        applier.store.add_named(NamedKind::Tag, item.clone());
        let mut game = Game::new("It Takes Two");
        game.tag_ids = vec![item.id];
        applier.store.add_game(game);

        applier.apply(&envelope(ObjectType::Tag, 3)).await.unwrap();

        assert!(applier.store.named(NamedKind::Tag, item.id).is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn removal_requires_the_name_to_match_too() {
        let item = NamedItem::new("Indie");
        let mut removal = dto(item.id, "Arcade");
        removal.removed = true;
        let transport = ScriptedTransport::new();
        transport.put_named(NamedKind::Genre, 8, removal);
        let (applier, _dir) = applier_with(transport);
        applier.store.add_named(NamedKind::Genre, item.clone());

        applier
            .apply(&envelope(ObjectType::Genre, 8))
            .await
            .unwrap();

        assert!(applier.store.named(NamedKind::Genre, item.id).is_some());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn an_unreferenced_item_is_removed_under_grace() {
        let item = NamedItem::new("abandoned");
        let mut removal = wire::to_dto(&item);
        removal.removed = true;
        let transport = ScriptedTransport::new();
        transport.put_named(NamedKind::Source, 9, removal);
        let (applier, _dir) = applier_with(transport);
        applier.store.add_named(NamedKind::Source, item.clone());

        applier
            .apply(&envelope(ObjectType::Source, 9))
            .await
            .unwrap();

        assert!(applier.store.named(NamedKind::Source, item.id).is_none());
        assert!(applier.grace.is_suppressed(ObjectType::Source, item.id));
    }
}
