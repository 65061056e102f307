//! Apply path for games, full and diff forms
//!
//! Games are located by their provider identity (`game_id` plus `plugin_id`),
//! never by name. When the provider identity matches under a different entity
//! id, the local record adopts the incoming id and the stale one is retired.

use crate::diff::game as wire;
use crate::models::{AttachmentKind, EntityId, Game, GameDto, ObjectType};
use crate::Result;

use super::{attachments, ChangeApplier};

pub(super) async fn apply_full(applier: &ChangeApplier, object_id: i64) -> Result<()> {
    let dto = applier.transport.fetch_game(object_id).await?;
    handle(applier, &dto, object_id).await
}

pub(super) async fn apply_diff(applier: &ChangeApplier, object_id: i64) -> Result<()> {
    let dto = applier.transport.fetch_game_diff(object_id).await?;
    if dto.removed {
        return remove(applier, dto.id, dto.name.as_deref().unwrap_or_default());
    }

    let located = applier
        .store
        .game_by_provider(dto.game_id.as_deref(), dto.plugin_id)
        .filter(|game| game.id == dto.id);
    let Some(mut game) = located else {
        tracing::debug!(id = %dto.id, "no local game behind diff, fetching the full object");
        let full = applier.transport.fetch_game(dto.base_object_id).await?;
        return handle(applier, &full, dto.base_object_id).await;
    };

    wire::apply_diff(&mut game, &dto);
    let owner = game.id;
    for kind in AttachmentKind::ALL {
        attachments::sync_diff_slot(
            applier,
            ObjectType::Game,
            dto.base_object_id,
            owner,
            kind,
            dto.changed(kind.field_name()),
            game.attachment_mut(kind),
        )
        .await?;
    }

    tracing::info!(id = %game.id, "saving game {} from diff", game.name);
    applier.grace.suppress(ObjectType::Game, game.id);
    applier.store.update_game(game)?;
    Ok(())
}

async fn handle(applier: &ChangeApplier, dto: &GameDto, object_id: i64) -> Result<()> {
    if dto.removed {
        remove(applier, dto.id, dto.name.as_deref().unwrap_or_default())
    } else {
        save(applier, dto, object_id).await
    }
}

async fn save(applier: &ChangeApplier, dto: &GameDto, object_id: i64) -> Result<()> {
    let located = applier
        .store
        .game_by_provider(dto.game_id.as_deref(), dto.plugin_id);
    let (mut game, is_new, reassign_from) = match located {
        Some(found) if found.id == dto.id => (found, false, None),
        Some(found) => {
            // same provider identity under a different entity id: adopt the
            // incoming id, keep everything else including attachment handles
            let mut adopted = found.clone();
            adopted.id = dto.id;
            (adopted, true, Some(found))
        }
        None => (Game::new(""), true, None),
    };

    let changed = is_new || wire::differs(&game, dto);
    wire::fill(&mut game, dto);
    if !changed {
        tracing::debug!(id = %game.id, "game unchanged, skipping");
        return Ok(());
    }

    if is_new {
        tracing::info!(id = %game.id, "saving new game {}", game.name);
        applier.grace.suppress(ObjectType::Game, game.id);
        game = applier.store.add_game(game);
    }

    let owner = game.id;
    for kind in AttachmentKind::ALL {
        attachments::sync_full_slot(
            applier,
            ObjectType::Game,
            object_id,
            owner,
            kind,
            dto.has_attachment(kind),
            game.attachment_mut(kind),
        )
        .await?;
    }

    tracing::info!(id = %game.id, "saving game {}", game.name);
    applier.grace.suppress(ObjectType::Game, game.id);
    applier.store.update_game(game.clone())?;

    if let Some(old) = reassign_from {
        // nothing references a game by id; the adopted copy owns the old
        // record's attachment handles, so the files stay
        tracing::info!("reassigning game {} to {}", old.id, game.id);
        applier.grace.suppress(ObjectType::Game, old.id);
        applier.store.remove_game(old.id);
    }
    Ok(())
}

fn remove(applier: &ChangeApplier, id: EntityId, name: &str) -> Result<()> {
    let matched = applier.store.game(id).filter(|game| game.name == name);
    applier.grace.suppress(ObjectType::Game, id);
    if let Some(game) = matched {
        tracing::info!(%id, "removing game {}", game.name);
        attachments::discard_files(
            applier,
            AttachmentKind::ALL.map(|kind| game.attachment(kind)),
        )?;
        applier.store.remove_game(id);
    }
    Ok(())
}
