//! Wire mapping for platforms, full and diff forms

use crate::models::{field, Platform, PlatformDiffDto, PlatformDto};

#[must_use]
pub fn to_dto(platform: &Platform) -> PlatformDto {
    PlatformDto {
        id: platform.id,
        name: Some(platform.name.clone()),
        removed: false,
        specification_id: platform.specification_id.clone(),
        has_icon: platform.icon.is_some(),
        has_cover_image: platform.cover_image.is_some(),
        has_background_image: platform.background_image.is_some(),
    }
}

/// Overwrite the scalar fields. Attachment handles stay untouched here; the
/// attachment pipeline owns them.
pub fn fill(platform: &mut Platform, dto: &PlatformDto) {
    platform.id = dto.id;
    platform.name = dto.name.clone().unwrap_or_default();
    platform.specification_id = dto.specification_id.clone();
}

/// Whether the DTO describes a different state than the local platform,
/// attachment presence included
#[must_use]
pub fn differs(platform: &Platform, dto: &PlatformDto) -> bool {
    dto.name.as_deref().unwrap_or_default() != platform.name
        || dto.specification_id != platform.specification_id
        || dto.has_icon != platform.icon.is_some()
        || dto.has_cover_image != platform.cover_image.is_some()
        || dto.has_background_image != platform.background_image.is_some()
}

/// Diff between two local snapshots of the same platform
#[must_use]
pub fn compute_diff(old: &Platform, new: &Platform) -> PlatformDiffDto {
    let mut dto = PlatformDiffDto {
        id: new.id,
        name: Some(new.name.clone()),
        ..PlatformDiffDto::default()
    };
    if old.id != new.id {
        dto.changed_fields.push(field::ID.into());
    }
    if old.name != new.name {
        dto.changed_fields.push(field::NAME.into());
    }
    if old.specification_id != new.specification_id {
        dto.specification_id = new.specification_id.clone();
        dto.changed_fields.push(field::SPECIFICATION_ID.into());
    }
    if old.icon != new.icon {
        dto.changed_fields.push(field::ICON.into());
    }
    if old.cover_image != new.cover_image {
        dto.changed_fields.push(field::COVER_IMAGE.into());
    }
    if old.background_image != new.background_image {
        dto.changed_fields.push(field::BACKGROUND_IMAGE.into());
    }
    dto
}

/// Apply a diff's named fields. The identity always follows the DTO; a named
/// field with a missing payload is an explicit clear.
pub fn apply_diff(platform: &mut Platform, dto: &PlatformDiffDto) {
    platform.id = dto.id;
    if dto.changed(field::NAME) {
        platform.name = dto.name.clone().unwrap_or_default();
    }
    if dto.changed(field::SPECIFICATION_ID) {
        platform.specification_id = dto.specification_id.clone();
    }
}
