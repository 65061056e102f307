//! Scripted in-memory transport for tests.
//!
//! Seed it with the DTOs, attachments, change feeds and stream sessions a
//! test needs, then hand it to the code under test as an `Arc<dyn
//! SyncTransport>`. Everything sent through the save and delete methods is
//! captured for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{
    ChangeEnvelope, FilterPresetDto, GameChangeRequest, GameDiffDto, GameDto, NamedItemDto,
    NamedKind, ObjectType, PlatformDiffDto, PlatformDto,
};
use crate::{Error, Result};

use super::{Attachment, AttachmentUpload, ChangeStream, SyncTransport};

/// Everything a transport was asked to write, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    SaveNamed(NamedKind, NamedItemDto),
    DeleteNamed(NamedKind, NamedItemDto),
    SavePlatform(PlatformDto, Vec<AttachmentUpload>),
    SavePlatformDiff(PlatformDiffDto, Vec<AttachmentUpload>),
    DeletePlatform(PlatformDto),
    SaveGame(GameDto, Vec<AttachmentUpload>),
    SaveGameDiff(GameDiffDto, Vec<AttachmentUpload>),
    DeleteGame(GameDto),
    SavePreset(FilterPresetDto),
    DeletePreset(FilterPresetDto),
}

#[derive(Default)]
struct Seeds {
    named: HashMap<(NamedKind, i64), NamedItemDto>,
    platforms: HashMap<i64, PlatformDto>,
    platform_diffs: HashMap<i64, PlatformDiffDto>,
    games: HashMap<i64, GameDto>,
    game_diffs: HashMap<i64, GameDiffDto>,
    presets: HashMap<i64, FilterPresetDto>,
    attachments: HashMap<(ObjectType, i64, String), Attachment>,
    all_changes: Vec<ChangeEnvelope>,
    sequenced: Vec<ChangeEnvelope>,
    game_changes: Vec<ChangeEnvelope>,
    streams: VecDeque<Vec<Result<String>>>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    seeds: Mutex<Seeds>,
    sent: Mutex<Vec<Outbound>>,
    reject_diff_saves: Mutex<bool>,
    fail_health: Mutex<bool>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_named(&self, kind: NamedKind, object_id: i64, dto: NamedItemDto) {
        self.seeds.lock().unwrap().named.insert((kind, object_id), dto);
    }

    pub fn put_platform(&self, object_id: i64, dto: PlatformDto) {
        self.seeds.lock().unwrap().platforms.insert(object_id, dto);
    }

    pub fn put_platform_diff(&self, object_id: i64, dto: PlatformDiffDto) {
        self.seeds
            .lock()
            .unwrap()
            .platform_diffs
            .insert(object_id, dto);
    }

    pub fn put_game(&self, object_id: i64, dto: GameDto) {
        self.seeds.lock().unwrap().games.insert(object_id, dto);
    }

    pub fn put_game_diff(&self, object_id: i64, dto: GameDiffDto) {
        self.seeds.lock().unwrap().game_diffs.insert(object_id, dto);
    }

    pub fn put_preset(&self, object_id: i64, dto: FilterPresetDto) {
        self.seeds.lock().unwrap().presets.insert(object_id, dto);
    }

    pub fn put_attachment(
        &self,
        target: ObjectType,
        object_id: i64,
        name: &str,
        attachment: Attachment,
    ) {
        self.seeds
            .lock()
            .unwrap()
            .attachments
            .insert((target, object_id, name.to_string()), attachment);
    }

    pub fn set_all_changes(&self, changes: Vec<ChangeEnvelope>) {
        self.seeds.lock().unwrap().all_changes = changes;
    }

    pub fn set_sequenced_changes(&self, changes: Vec<ChangeEnvelope>) {
        self.seeds.lock().unwrap().sequenced = changes;
    }

    pub fn set_game_changes(&self, changes: Vec<ChangeEnvelope>) {
        self.seeds.lock().unwrap().game_changes = changes;
    }

    /// Script one stream session; each call queues a further session served
    /// by the next `open_change_stream`.
    pub fn push_stream_session(&self, lines: Vec<Result<String>>) {
        self.seeds.lock().unwrap().streams.push_back(lines);
    }

    /// Sessions queued but not yet served.
    pub fn remaining_stream_sessions(&self) -> usize {
        self.seeds.lock().unwrap().streams.len()
    }

    /// Make every diff save fail the way the server rejects stale diffs.
    pub fn reject_diff_saves(&self) {
        *self.reject_diff_saves.lock().unwrap() = true;
    }

    pub fn fail_health(&self) {
        *self.fail_health.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, outbound: Outbound) {
        self.sent.lock().unwrap().push(outbound);
    }

    fn missing(what: &str, object_id: i64) -> Error {
        Error::Status {
            status: 404,
            message: format!("no scripted {what} for object {object_id}"),
        }
    }
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    fn client_id(&self) -> &str {
        "self"
    }

    fn server_address(&self) -> &str {
        "http://scripted"
    }

    async fn health(&self) -> Result<String> {
        if *self.fail_health.lock().unwrap() {
            return Err(Error::Status {
                status: 503,
                message: "unhealthy".into(),
            });
        }
        Ok("OK".into())
    }

    async fn fetch_named(&self, kind: NamedKind, object_id: i64) -> Result<NamedItemDto> {
        self.seeds
            .lock()
            .unwrap()
            .named
            .get(&(kind, object_id))
            .cloned()
            .ok_or_else(|| Self::missing("named item", object_id))
    }

    async fn save_named(&self, kind: NamedKind, dto: &NamedItemDto) -> Result<()> {
        self.record(Outbound::SaveNamed(kind, dto.clone()));
        Ok(())
    }

    async fn delete_named(&self, kind: NamedKind, dto: &NamedItemDto) -> Result<()> {
        self.record(Outbound::DeleteNamed(kind, dto.clone()));
        Ok(())
    }

    async fn fetch_platform(&self, object_id: i64) -> Result<PlatformDto> {
        self.seeds
            .lock()
            .unwrap()
            .platforms
            .get(&object_id)
            .cloned()
            .ok_or_else(|| Self::missing("platform", object_id))
    }

    async fn fetch_platform_diff(&self, object_id: i64) -> Result<PlatformDiffDto> {
        self.seeds
            .lock()
            .unwrap()
            .platform_diffs
            .get(&object_id)
            .cloned()
            .ok_or_else(|| Self::missing("platform diff", object_id))
    }

    async fn save_platform(&self, dto: &PlatformDto, files: Vec<AttachmentUpload>) -> Result<()> {
        self.record(Outbound::SavePlatform(dto.clone(), files));
        Ok(())
    }

    async fn save_platform_diff(
        &self,
        dto: &PlatformDiffDto,
        files: Vec<AttachmentUpload>,
    ) -> Result<()> {
        if *self.reject_diff_saves.lock().unwrap() {
            return Err(Error::ManualSyncRequired);
        }
        self.record(Outbound::SavePlatformDiff(dto.clone(), files));
        Ok(())
    }

    async fn delete_platform(&self, dto: &PlatformDto) -> Result<()> {
        self.record(Outbound::DeletePlatform(dto.clone()));
        Ok(())
    }

    async fn fetch_game(&self, object_id: i64) -> Result<GameDto> {
        self.seeds
            .lock()
            .unwrap()
            .games
            .get(&object_id)
            .cloned()
            .ok_or_else(|| Self::missing("game", object_id))
    }

    async fn fetch_game_diff(&self, object_id: i64) -> Result<GameDiffDto> {
        self.seeds
            .lock()
            .unwrap()
            .game_diffs
            .get(&object_id)
            .cloned()
            .ok_or_else(|| Self::missing("game diff", object_id))
    }

    async fn save_game(&self, dto: &GameDto, files: Vec<AttachmentUpload>) -> Result<()> {
        self.record(Outbound::SaveGame(dto.clone(), files));
        Ok(())
    }

    async fn save_game_diff(&self, dto: &GameDiffDto, files: Vec<AttachmentUpload>) -> Result<()> {
        if *self.reject_diff_saves.lock().unwrap() {
            return Err(Error::ManualSyncRequired);
        }
        self.record(Outbound::SaveGameDiff(dto.clone(), files));
        Ok(())
    }

    async fn delete_game(&self, dto: &GameDto) -> Result<()> {
        self.record(Outbound::DeleteGame(dto.clone()));
        Ok(())
    }

    async fn fetch_filter_preset(&self, object_id: i64) -> Result<FilterPresetDto> {
        self.seeds
            .lock()
            .unwrap()
            .presets
            .get(&object_id)
            .cloned()
            .ok_or_else(|| Self::missing("filter preset", object_id))
    }

    async fn save_filter_preset(&self, dto: &FilterPresetDto) -> Result<()> {
        self.record(Outbound::SavePreset(dto.clone()));
        Ok(())
    }

    async fn delete_filter_preset(&self, dto: &FilterPresetDto) -> Result<()> {
        self.record(Outbound::DeletePreset(dto.clone()));
        Ok(())
    }

    async fn fetch_attachment(
        &self,
        target: ObjectType,
        object_id: i64,
        name: &str,
    ) -> Result<Option<Attachment>> {
        Ok(self
            .seeds
            .lock()
            .unwrap()
            .attachments
            .get(&(target, object_id, name.to_string()))
            .cloned())
    }

    async fn fetch_all_changes(&self) -> Result<Vec<ChangeEnvelope>> {
        Ok(self.seeds.lock().unwrap().all_changes.clone())
    }

    async fn fetch_changes_since(&self, last_change_id: i64) -> Result<Vec<ChangeEnvelope>> {
        Ok(self
            .seeds
            .lock()
            .unwrap()
            .sequenced
            .iter()
            .filter(|envelope| envelope.id.is_some_and(|id| id > last_change_id))
            .cloned()
            .collect())
    }

    async fn fetch_game_changes(&self, _request: &GameChangeRequest) -> Result<Vec<ChangeEnvelope>> {
        Ok(self.seeds.lock().unwrap().game_changes.clone())
    }

    async fn open_change_stream(&self, _last_change_id: i64) -> Result<ChangeStream> {
        let Some(lines) = self.seeds.lock().unwrap().streams.pop_front() else {
            return Err(Error::Status {
                status: 503,
                message: "no scripted stream session".into(),
            });
        };
        Ok(Box::pin(futures::stream::iter(lines)))
    }
}
