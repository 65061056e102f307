//! Apply path for platforms, full and diff forms

use crate::diff::platform as wire;
use crate::models::{AttachmentKind, EntityId, ObjectType, Platform, PlatformDto};
use crate::Result;

use super::{attachments, ChangeApplier};

pub(super) async fn apply_full(applier: &ChangeApplier, object_id: i64) -> Result<()> {
    let dto = applier.transport.fetch_platform(object_id).await?;
    handle(applier, &dto, object_id).await
}

pub(super) async fn apply_diff(applier: &ChangeApplier, object_id: i64) -> Result<()> {
    let dto = applier.transport.fetch_platform_diff(object_id).await?;
    if dto.removed {
        return remove(applier, dto.id, dto.name.as_deref().unwrap_or_default());
    }

    // a diff only ever patches an exact identity match
    let Some(mut platform) = applier.store.platform(dto.id) else {
        tracing::debug!(id = %dto.id, "no local platform behind diff, fetching the full object");
        let full = applier.transport.fetch_platform(dto.base_object_id).await?;
        return handle(applier, &full, dto.base_object_id).await;
    };

    wire::apply_diff(&mut platform, &dto);
    let owner = platform.id;
    for kind in AttachmentKind::ALL {
        attachments::sync_diff_slot(
            applier,
            ObjectType::Platform,
            dto.base_object_id,
            owner,
            kind,
            dto.changed(kind.field_name()),
            platform.attachment_mut(kind),
        )
        .await?;
    }

    tracing::info!(id = %platform.id, "saving platform {} from diff", platform.name);
    applier.grace.suppress(ObjectType::Platform, platform.id);
    applier.store.update_platform(platform)?;
    Ok(())
}

async fn handle(applier: &ChangeApplier, dto: &PlatformDto, object_id: i64) -> Result<()> {
    if dto.removed {
        remove(applier, dto.id, dto.name.as_deref().unwrap_or_default())
    } else {
        save(applier, dto, object_id).await
    }
}

async fn save(applier: &ChangeApplier, dto: &PlatformDto, object_id: i64) -> Result<()> {
    let name = dto.name.as_deref().unwrap_or_default();
    let (mut platform, is_new, reassign_from) = match applier.store.platform(dto.id) {
        Some(found) => (found, false, None),
        None => (
            Platform::new(""),
            true,
            applier.store.platform_by_name(name),
        ),
    };

    let changed = is_new || wire::differs(&platform, dto);
    wire::fill(&mut platform, dto);
    if !changed {
        tracing::debug!(id = %platform.id, "platform unchanged, skipping");
        return Ok(());
    }

    if is_new {
        tracing::info!(id = %platform.id, "saving new platform {}", platform.name);
        applier.grace.suppress(ObjectType::Platform, platform.id);
        applier.store.add_platform(platform.clone());
    }

    // attachments need the stored entity's identity, so they come after the
    // first save and are persisted by a second one
    let owner = platform.id;
    for kind in AttachmentKind::ALL {
        attachments::sync_full_slot(
            applier,
            ObjectType::Platform,
            object_id,
            owner,
            kind,
            dto.has_attachment(kind),
            platform.attachment_mut(kind),
        )
        .await?;
    }

    tracing::info!(id = %platform.id, "saving platform {}", platform.name);
    applier.grace.suppress(ObjectType::Platform, platform.id);
    applier.store.update_platform(platform.clone())?;

    if let Some(old) = reassign_from {
        tracing::info!("reassigning platform {} to {}", old.id, platform.id);
        applier.reassign_references(ObjectType::Platform, old.id, platform.id)?;
        applier.grace.suppress(ObjectType::Platform, old.id);
        applier.store.remove_platform(old.id);
    }
    Ok(())
}

fn remove(applier: &ChangeApplier, id: EntityId, name: &str) -> Result<()> {
    if applier.is_referenced(ObjectType::Platform, id) {
        tracing::info!(%id, "platform still referenced, cannot remove");
        return Ok(());
    }

    let matched = applier
        .store
        .platform(id)
        .filter(|platform| platform.name == name);
    applier.grace.suppress(ObjectType::Platform, id);
    if let Some(platform) = matched {
        tracing::info!(%id, "removing platform {}", platform.name);
        attachments::discard_files(
            applier,
            AttachmentKind::ALL.map(|kind| platform.attachment(kind)),
        )?;
        applier.store.remove_platform(id);
    }
    Ok(())
}
