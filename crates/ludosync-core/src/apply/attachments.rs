//! Attachment slot synchronization
//!
//! Bytes travel outside the object payloads, so applying a change may need
//! extra fetches per attachment slot. A fetched file lands in a scratch path
//! first, is registered with the local file store to obtain its handle, and
//! only after the entity field points at the new handle is the previous file
//! discarded. Slot state is keyed by the DTO's presence flag on the full
//! path and by `changedFields` membership on the diff path.

use uuid::Uuid;

use crate::models::{AttachmentKind, EntityId, ObjectType};
use crate::transport::Attachment;
use crate::Result;

use super::ChangeApplier;

/// Bring one slot in line with a full DTO's presence flag.
pub(super) async fn sync_full_slot(
    applier: &ChangeApplier,
    target: ObjectType,
    object_id: i64,
    owner: EntityId,
    kind: AttachmentKind,
    present: bool,
    slot: &mut Option<String>,
) -> Result<()> {
    if present {
        let name = kind.field_name();
        match applier.transport.fetch_attachment(target, object_id, name).await? {
            Some(attachment) => replace_slot(applier, object_id, owner, kind, attachment, slot)?,
            // flagged present but the server holds no file; leave the slot be
            None => tracing::warn!(%target, object_id, name, "attachment missing on server"),
        }
    } else {
        clear_slot(applier, slot)?;
    }
    Ok(())
}

/// Bring one slot in line with a diff. Slots not named in `changedFields`
/// are never touched; a named slot with no server content is a removal.
pub(super) async fn sync_diff_slot(
    applier: &ChangeApplier,
    target: ObjectType,
    base_object_id: i64,
    owner: EntityId,
    kind: AttachmentKind,
    named: bool,
    slot: &mut Option<String>,
) -> Result<()> {
    if !named {
        return Ok(());
    }
    let name = kind.field_name();
    match applier
        .transport
        .fetch_attachment(target, base_object_id, name)
        .await?
    {
        Some(attachment) => replace_slot(applier, base_object_id, owner, kind, attachment, slot)?,
        None => clear_slot(applier, slot)?,
    }
    Ok(())
}

/// Delete the files behind a removed record's attachment handles.
pub(super) fn discard_files<'a>(
    applier: &ChangeApplier,
    handles: impl IntoIterator<Item = Option<&'a str>>,
) -> Result<()> {
    for handle in handles.into_iter().flatten() {
        applier.files.remove(handle)?;
    }
    Ok(())
}

fn replace_slot(
    applier: &ChangeApplier,
    object_id: i64,
    owner: EntityId,
    kind: AttachmentKind,
    attachment: Attachment,
    slot: &mut Option<String>,
) -> Result<()> {
    let file_name = attachment
        .file_name
        .unwrap_or_else(|| kind.field_name().to_string());
    let scratch = std::env::temp_dir().join(format!("{}-{object_id}-{file_name}", Uuid::now_v7()));
    tracing::debug!(path = %scratch.display(), "writing fetched attachment to scratch");
    std::fs::write(&scratch, &attachment.bytes)?;

    let added = applier.files.add(owner, &scratch);
    let cleanup = std::fs::remove_file(&scratch);
    let handle = added?;
    cleanup?;

    if let Some(previous) = slot.replace(handle) {
        tracing::debug!(previous, "removing replaced attachment");
        applier.files.remove(&previous)?;
    }
    Ok(())
}

fn clear_slot(applier: &ChangeApplier, slot: &mut Option<String>) -> Result<()> {
    if let Some(previous) = slot.take() {
        tracing::debug!(previous, "removing cleared attachment");
        applier.files.remove(&previous)?;
    }
    Ok(())
}
