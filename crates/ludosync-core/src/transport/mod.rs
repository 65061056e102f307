//! Server transport contract
//!
//! [`SyncTransport`] is the seam between the sync core and the backend:
//! typed fetch/save/delete per object kind, the change feed endpoints, the
//! attachment endpoints and the live change stream. The production
//! implementation is [`HttpTransport`]; tests script the trait directly.
//!
//! Saves and deletes always carry the transport's client id so the server
//! can stamp the resulting change records; that stamp is what lets this
//! client recognize its own writes when they come back through the feed.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::models::{
    AttachmentKind, ChangeEnvelope, FilterPresetDto, GameChangeRequest, GameDiffDto, GameDto,
    NamedItemDto, NamedKind, ObjectType, PlatformDiffDto, PlatformDto,
};
use crate::Result;

mod http;
#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpTransport;

/// Raw lines of an open change stream. Interpretation of the `data:` framing
/// belongs to the consumer loop, not the transport.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A binary attachment fetched from the server. The file name comes from the
/// response's content disposition when the server provides one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
}

/// One file part of a multipart save. The part file name encodes the
/// attachment slot and the original extension, e.g. `Icon.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub kind: AttachmentKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AttachmentUpload {
    /// Build an upload for `kind`, carrying over the extension of the local
    /// storage handle the bytes came from.
    #[must_use]
    pub fn from_handle(kind: AttachmentKind, handle: &str, bytes: Vec<u8>) -> Self {
        let extension = Path::new(handle)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        Self {
            kind,
            file_name: format!("{}{extension}", kind.field_name()),
            bytes,
        }
    }
}

/// Typed client for the synchronization backend.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// The id this transport stamps on its own saves and deletes.
    fn client_id(&self) -> &str;

    /// The server address this transport talks to.
    fn server_address(&self) -> &str;

    /// Probe the health endpoint; a reachable server answers `OK`.
    async fn health(&self) -> Result<String>;

    async fn fetch_named(&self, kind: NamedKind, object_id: i64) -> Result<NamedItemDto>;
    async fn save_named(&self, kind: NamedKind, dto: &NamedItemDto) -> Result<()>;
    async fn delete_named(&self, kind: NamedKind, dto: &NamedItemDto) -> Result<()>;

    async fn fetch_platform(&self, object_id: i64) -> Result<PlatformDto>;
    async fn fetch_platform_diff(&self, object_id: i64) -> Result<PlatformDiffDto>;
    async fn save_platform(&self, dto: &PlatformDto, files: Vec<AttachmentUpload>) -> Result<()>;
    /// Save a platform diff. Only file parts named in the diff's
    /// `changedFields` are transmitted.
    async fn save_platform_diff(
        &self,
        dto: &PlatformDiffDto,
        files: Vec<AttachmentUpload>,
    ) -> Result<()>;
    async fn delete_platform(&self, dto: &PlatformDto) -> Result<()>;

    async fn fetch_game(&self, object_id: i64) -> Result<GameDto>;
    async fn fetch_game_diff(&self, object_id: i64) -> Result<GameDiffDto>;
    async fn save_game(&self, dto: &GameDto, files: Vec<AttachmentUpload>) -> Result<()>;
    /// Save a game diff. Only file parts named in the diff's `changedFields`
    /// are transmitted.
    async fn save_game_diff(&self, dto: &GameDiffDto, files: Vec<AttachmentUpload>) -> Result<()>;
    async fn delete_game(&self, dto: &GameDto) -> Result<()>;

    async fn fetch_filter_preset(&self, object_id: i64) -> Result<FilterPresetDto>;
    async fn save_filter_preset(&self, dto: &FilterPresetDto) -> Result<()>;
    async fn delete_filter_preset(&self, dto: &FilterPresetDto) -> Result<()>;

    /// Fetch one attachment of the object behind `object_id`. `Ok(None)`
    /// means the server holds no such file.
    async fn fetch_attachment(
        &self,
        target: ObjectType,
        object_id: i64,
        name: &str,
    ) -> Result<Option<Attachment>>;

    /// Every change the server knows, one synthetic envelope per live object.
    async fn fetch_all_changes(&self) -> Result<Vec<ChangeEnvelope>>;
    /// The sequenced changes after `last_change_id`, oldest first.
    async fn fetch_changes_since(&self, last_change_id: i64) -> Result<Vec<ChangeEnvelope>>;
    /// Synthetic envelopes for the requested set of games.
    async fn fetch_game_changes(&self, request: &GameChangeRequest) -> Result<Vec<ChangeEnvelope>>;

    /// Open the live change stream, resuming after `last_change_id`.
    async fn open_change_stream(&self, last_change_id: i64) -> Result<ChangeStream>;
}
