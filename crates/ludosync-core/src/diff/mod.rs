//! Mapping between library entities and their wire forms
//!
//! Full DTOs are built and applied here, as are per-field diff DTOs and the
//! change predicates the apply pipeline keys its skip decisions on. Mapping
//! code never touches attachment handles; binary slots only surface as
//! presence flags and `changedFields` entries, the bytes move through the
//! attachment pipeline.

pub mod game;
pub mod named;
pub mod platform;
pub mod preset;

use crate::models::{EntityId, NamedRef, ObjectType};

/// Resolves display names when building outbound payloads.
///
/// Ids that do not resolve are dropped from the payload, so dangling
/// references never propagate to other clients.
pub trait NameResolver {
    fn entity_name(&self, target: ObjectType, id: EntityId) -> Option<String>;
}

/// Whether an id list moved between two revisions.
///
/// Changed means the lengths differ or some old id is gone from the new
/// list. Equal-length lists where a duplicated old id masks a new one count
/// as unchanged; every peer on the wire runs the same test.
#[must_use]
pub fn ids_changed(old: &[EntityId], new: &[EntityId]) -> bool {
    old.len() != new.len() || old.iter().any(|id| !new.contains(id))
}

/// Id view of an optional reference list; an absent list reads as empty
#[must_use]
pub fn ref_ids(refs: Option<&[NamedRef]>) -> Vec<EntityId> {
    refs.map(|refs| refs.iter().map(|named| named.id).collect())
        .unwrap_or_default()
}

pub(crate) fn resolve_refs(
    names: &dyn NameResolver,
    target: ObjectType,
    ids: &[EntityId],
) -> Vec<NamedRef> {
    ids.iter()
        .filter_map(|&id| {
            names.entity_name(target, id).map(|name| NamedRef {
                id,
                name: Some(name),
            })
        })
        .collect()
}

pub(crate) fn resolve_ref(
    names: &dyn NameResolver,
    target: ObjectType,
    id: Option<EntityId>,
) -> Option<NamedRef> {
    let id = id?;
    names.entity_name(target, id).map(|name| NamedRef {
        id,
        name: Some(name),
    })
}
