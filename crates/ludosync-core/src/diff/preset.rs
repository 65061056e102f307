//! Wire mapping for filter presets

use crate::models::{FilterPreset, FilterPresetDto, FilterPresetSettings};

#[must_use]
pub fn to_dto(preset: &FilterPreset) -> FilterPresetDto {
    FilterPresetDto {
        id: preset.id,
        name: Some(preset.name.clone()),
        removed: false,
        settings: normalized(preset.settings.as_ref()),
        sorting_order: preset.sorting_order.clone(),
        sorting_order_direction: preset.sorting_order_direction.clone(),
        grouping_order: preset.grouping_order.clone(),
        show_in_fullscreen_quick_selection: preset.show_in_fullscreen_quick_selection,
    }
}

/// Overwrite `preset` with the DTO's fields, identity included
pub fn fill(preset: &mut FilterPreset, dto: &FilterPresetDto) {
    preset.id = dto.id;
    preset.name = dto.name.clone().unwrap_or_default();
    preset.settings = normalized(dto.settings.as_ref());
    preset.sorting_order = dto.sorting_order.clone();
    preset.sorting_order_direction = dto.sorting_order_direction.clone();
    preset.grouping_order = dto.grouping_order.clone();
    preset.show_in_fullscreen_quick_selection = dto.show_in_fullscreen_quick_selection;
}

/// Whether the DTO describes a different state than the local preset.
/// Settings compare after normalization so filter list order never counts.
#[must_use]
pub fn differs(preset: &FilterPreset, dto: &FilterPresetDto) -> bool {
    dto.name.as_deref().unwrap_or_default() != preset.name
        || normalized(dto.settings.as_ref()) != normalized(preset.settings.as_ref())
        || dto.sorting_order != preset.sorting_order
        || dto.sorting_order_direction != preset.sorting_order_direction
        || dto.grouping_order != preset.grouping_order
        || dto.show_in_fullscreen_quick_selection != preset.show_in_fullscreen_quick_selection
}

fn normalized(settings: Option<&FilterPresetSettings>) -> Option<FilterPresetSettings> {
    settings.map(|settings| {
        let mut settings = settings.clone();
        settings.normalize();
        settings
    })
}
