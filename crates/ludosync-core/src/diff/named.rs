//! Wire mapping for the plain named kinds

use crate::models::{NamedItem, NamedItemDto};

#[must_use]
pub fn to_dto(item: &NamedItem) -> NamedItemDto {
    NamedItemDto {
        id: item.id,
        name: Some(item.name.clone()),
        removed: false,
        specification_id: item.specification_id.clone(),
    }
}

/// Overwrite `item` with the DTO's fields, identity included
pub fn fill(item: &mut NamedItem, dto: &NamedItemDto) {
    item.id = dto.id;
    item.name = dto.name.clone().unwrap_or_default();
    item.specification_id = dto.specification_id.clone();
}

/// Whether the DTO describes a different state than the local item
#[must_use]
pub fn differs(item: &NamedItem, dto: &NamedItemDto) -> bool {
    dto.name.as_deref().unwrap_or_default() != item.name
        || dto.specification_id != item.specification_id
}
