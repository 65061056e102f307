//! Apply path for filter presets

use crate::diff::preset as wire;
use crate::models::{FilterPreset, FilterPresetDto, ObjectType};
use crate::Result;

use super::ChangeApplier;

pub(super) async fn apply(applier: &ChangeApplier, object_id: i64) -> Result<()> {
    let dto = applier.transport.fetch_filter_preset(object_id).await?;
    if dto.removed {
        remove(applier, &dto)
    } else {
        save(applier, &dto)
    }
}

fn save(applier: &ChangeApplier, dto: &FilterPresetDto) -> Result<()> {
    let name = dto.name.as_deref().unwrap_or_default();
    let (mut preset, is_new, reassign_from) = match applier.store.filter_preset(dto.id) {
        Some(found) => (found, false, None),
        None => (
            FilterPreset::new(""),
            true,
            applier.store.filter_preset_by_name(name),
        ),
    };

    let changed = is_new || wire::differs(&preset, dto);
    wire::fill(&mut preset, dto);
    if !changed {
        tracing::debug!(id = %preset.id, "filter preset unchanged, skipping");
        return Ok(());
    }

    applier.grace.suppress(ObjectType::FilterPreset, preset.id);
    if is_new {
        tracing::info!(id = %preset.id, "saving new filter preset {}", preset.name);
        applier.store.add_filter_preset(preset);
    } else {
        tracing::info!(id = %preset.id, "saving filter preset {}", preset.name);
        applier.store.update_filter_preset(preset)?;
    }

    if let Some(old) = reassign_from {
        // nothing references a preset by id, the stale record just goes
        tracing::info!("reassigning filter preset {} to {}", old.id, dto.id);
        applier.grace.suppress(ObjectType::FilterPreset, old.id);
        applier.store.remove_filter_preset(old.id);
    }
    Ok(())
}

fn remove(applier: &ChangeApplier, dto: &FilterPresetDto) -> Result<()> {
    let name = dto.name.as_deref().unwrap_or_default();
    let matched = applier
        .store
        .filter_preset(dto.id)
        .filter(|preset| preset.name == name);
    applier.grace.suppress(ObjectType::FilterPreset, dto.id);
    if let Some(preset) = matched {
        tracing::info!(id = %dto.id, "removing filter preset {}", preset.name);
        applier.store.remove_filter_preset(dto.id);
    }
    Ok(())
}
