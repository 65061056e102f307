//! HTTP implementation of the transport contract
//!
//! Endpoint layout: `/api/{path}/{id}` for fetches, `/api/{path}/save` and
//! `/api/{path}/delete` for writes (client id in the query string),
//! `/api/{metadata-path}/{id}/{name}` for attachments and `/api/change/...`
//! for the feed. Platform and game saves are multipart with a `dto` JSON
//! part and one `files` part per attachment; everything else is plain JSON.
//!
//! A conflict response carrying `manualSyncRequired` or `forceFetchRequired`
//! maps to the matching typed error; any other non-success status becomes
//! [`Error::Status`] with a best-effort message from the body.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Attachment, AttachmentUpload, ChangeStream, SyncTransport};
use crate::models::{
    ChangeEnvelope, FilterPresetDto, GameChangeRequest, GameDiffDto, GameDto, NamedItemDto,
    NamedKind, ObjectType, PlatformDiffDto, PlatformDto,
};
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const STREAM_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Backend client speaking the HTTP wire protocol.
///
/// Every instance carries a fresh client id; rebuilding the transport (for
/// example after a server address change) deliberately changes the identity
/// the server sees.
pub struct HttpTransport {
    base_url: String,
    client_id: String,
    client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport for `server_address` with a newly generated client
    /// id. The address must be an absolute `http`/`https` URL.
    pub fn new(server_address: &str) -> Result<Self> {
        let base_url = normalize_server_address(server_address)?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let stream_client = reqwest::Client::builder().timeout(STREAM_TIMEOUT).build()?;
        Ok(Self {
            base_url,
            client_id: Uuid::now_v7().to_string(),
            client,
            stream_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = require_success(response).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        require_success(response).await?;
        Ok(())
    }

    async fn post_json_with_result<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let response = require_success(response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_object<T: DeserializeOwned>(
        &self,
        target: ObjectType,
        object_id: i64,
    ) -> Result<T> {
        self.get_json(&format!("/api/{}/{object_id}", target.path()))
            .await
    }

    async fn save_object<B: Serialize + Sync>(&self, target: ObjectType, dto: &B) -> Result<()> {
        self.post_json(
            &format!("/api/{}/save?clientId={}", target.path(), self.client_id),
            dto,
        )
        .await
    }

    async fn delete_object<B: Serialize + Sync>(&self, target: ObjectType, dto: &B) -> Result<()> {
        self.post_json(
            &format!("/api/{}/delete?clientId={}", target.path(), self.client_id),
            dto,
        )
        .await
    }

    async fn save_object_with_files<B: Serialize + Sync>(
        &self,
        target: ObjectType,
        dto: &B,
        files: Vec<AttachmentUpload>,
    ) -> Result<()> {
        let mut form = Form::new().part(
            "dto",
            Part::text(serde_json::to_string(dto)?).mime_str("application/json")?,
        );
        for upload in files {
            form = form.part("files", Part::bytes(upload.bytes).file_name(upload.file_name));
        }
        let response = self
            .client
            .post(self.url(&format!(
                "/api/{}/save?clientId={}",
                target.path(),
                self.client_id
            )))
            .multipart(form)
            .send()
            .await?;
        require_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn server_address(&self) -> &str {
        &self.base_url
    }

    async fn health(&self) -> Result<String> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        let response = require_success(response).await?;
        Ok(response.text().await?)
    }

    async fn fetch_named(&self, kind: NamedKind, object_id: i64) -> Result<NamedItemDto> {
        self.fetch_object(kind.object_type(), object_id).await
    }

    async fn save_named(&self, kind: NamedKind, dto: &NamedItemDto) -> Result<()> {
        self.save_object(kind.object_type(), dto).await
    }

    async fn delete_named(&self, kind: NamedKind, dto: &NamedItemDto) -> Result<()> {
        self.delete_object(kind.object_type(), dto).await
    }

    async fn fetch_platform(&self, object_id: i64) -> Result<PlatformDto> {
        self.fetch_object(ObjectType::Platform, object_id).await
    }

    async fn fetch_platform_diff(&self, object_id: i64) -> Result<PlatformDiffDto> {
        self.fetch_object(ObjectType::PlatformDiff, object_id).await
    }

    async fn save_platform(&self, dto: &PlatformDto, files: Vec<AttachmentUpload>) -> Result<()> {
        self.save_object_with_files(ObjectType::Platform, dto, files)
            .await
    }

    async fn save_platform_diff(
        &self,
        dto: &PlatformDiffDto,
        files: Vec<AttachmentUpload>,
    ) -> Result<()> {
        let files = files
            .into_iter()
            .filter(|upload| dto.changed(upload.kind.field_name()))
            .collect();
        self.save_object_with_files(ObjectType::PlatformDiff, dto, files)
            .await
    }

    async fn delete_platform(&self, dto: &PlatformDto) -> Result<()> {
        self.delete_object(ObjectType::Platform, dto).await
    }

    async fn fetch_game(&self, object_id: i64) -> Result<GameDto> {
        self.fetch_object(ObjectType::Game, object_id).await
    }

    async fn fetch_game_diff(&self, object_id: i64) -> Result<GameDiffDto> {
        self.fetch_object(ObjectType::GameDiff, object_id).await
    }

    async fn save_game(&self, dto: &GameDto, files: Vec<AttachmentUpload>) -> Result<()> {
        self.save_object_with_files(ObjectType::Game, dto, files)
            .await
    }

    async fn save_game_diff(&self, dto: &GameDiffDto, files: Vec<AttachmentUpload>) -> Result<()> {
        let files = files
            .into_iter()
            .filter(|upload| dto.changed(upload.kind.field_name()))
            .collect();
        self.save_object_with_files(ObjectType::GameDiff, dto, files)
            .await
    }

    async fn delete_game(&self, dto: &GameDto) -> Result<()> {
        self.delete_object(ObjectType::Game, dto).await
    }

    async fn fetch_filter_preset(&self, object_id: i64) -> Result<FilterPresetDto> {
        self.fetch_object(ObjectType::FilterPreset, object_id).await
    }

    async fn save_filter_preset(&self, dto: &FilterPresetDto) -> Result<()> {
        self.save_object(ObjectType::FilterPreset, dto).await
    }

    async fn delete_filter_preset(&self, dto: &FilterPresetDto) -> Result<()> {
        self.delete_object(ObjectType::FilterPreset, dto).await
    }

    async fn fetch_attachment(
        &self,
        target: ObjectType,
        object_id: i64,
        name: &str,
    ) -> Result<Option<Attachment>> {
        let Some(segment) = target.metadata_path() else {
            return Err(Error::InvalidInput(format!(
                "{target} objects carry no attachments"
            )));
        };
        let response = self
            .client
            .get(self.url(&format!("/api/{segment}/{object_id}/{name}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = require_success(response).await?;
        let file_name = content_disposition_filename(response.headers());
        let bytes = response.bytes().await?.to_vec();
        Ok(Some(Attachment { bytes, file_name }))
    }

    async fn fetch_all_changes(&self) -> Result<Vec<ChangeEnvelope>> {
        self.get_json("/api/change/all").await
    }

    async fn fetch_changes_since(&self, last_change_id: i64) -> Result<Vec<ChangeEnvelope>> {
        self.get_json(&format!("/api/change?lastChangeId={last_change_id}"))
            .await
    }

    async fn fetch_game_changes(&self, request: &GameChangeRequest) -> Result<Vec<ChangeEnvelope>> {
        self.post_json_with_result("/api/change/games", request)
            .await
    }

    async fn open_change_stream(&self, last_change_id: i64) -> Result<ChangeStream> {
        tracing::debug!(server = %self.base_url, last_change_id, "opening change stream");
        let response = self
            .stream_client
            .get(self.url(&format!("/api/change/stream?lastChangeId={last_change_id}")))
            .send()
            .await?;
        let response = require_success(response).await?;
        Ok(lines(response.bytes_stream()))
    }
}

fn normalize_server_address(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        reqwest::Url::parse(trimmed)
            .map_err(|error| Error::InvalidInput(format!("invalid server address: {error}")))?;
        Ok(trimmed.to_string())
    } else {
        Err(Error::InvalidInput(
            "server address must include http:// or https://".to_string(),
        ))
    }
}

async fn require_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(read_error(response).await)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

async fn read_error(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message);
    if status == StatusCode::CONFLICT {
        match message.as_deref() {
            Some("manualSyncRequired") => return Error::ManualSyncRequired,
            Some("forceFetchRequired") => return Error::ForceFetchRequired,
            _ => {}
        }
    }
    let message = message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "unexpected error".to_string()
        } else {
            trimmed.to_string()
        }
    });
    Error::Status {
        status: status.as_u16(),
        message,
    }
}

fn content_disposition_filename(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let raw = value
        .split(';')
        .find_map(|segment| segment.trim().strip_prefix("filename="))?;
    Some(raw.trim_matches('"').to_string())
}

/// Split a byte stream into text lines, tolerating chunk boundaries anywhere.
/// A trailing unterminated line is flushed when the source ends; a source
/// error ends the stream after surfacing it once.
fn lines<S, B, E>(source: S) -> ChangeStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<Error> + Send,
{
    let state = (Box::pin(source), Vec::new(), VecDeque::new(), false);
    Box::pin(futures::stream::unfold(
        state,
        |(mut source, mut buffer, mut ready, mut done): (
            _,
            Vec<u8>,
            VecDeque<String>,
            bool,
        )| async move {
            loop {
                if let Some(line) = ready.pop_front() {
                    return Some((Ok(line), (source, buffer, ready, done)));
                }
                if done {
                    return None;
                }
                match source.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(chunk.as_ref());
                        while let Some(at) = buffer.iter().position(|byte| *byte == b'\n') {
                            let mut line: Vec<u8> = buffer.drain(..=at).collect();
                            line.pop();
                            if line.last() == Some(&b'\r') {
                                line.pop();
                            }
                            ready.push_back(String::from_utf8_lossy(&line).into_owned());
                        }
                    }
                    Some(Err(error)) => {
                        done = true;
                        return Some((Err(error.into()), (source, buffer, ready, done)));
                    }
                    None => {
                        done = true;
                        if !buffer.is_empty() {
                            let rest = std::mem::take(&mut buffer);
                            ready.push_back(String::from_utf8_lossy(&rest).into_owned());
                        }
                    }
                }
            }
        },
    ))
}
