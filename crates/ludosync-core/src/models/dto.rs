//! Full-object wire representations
//!
//! DTOs carry every synchronizable field of an entity. Binary attachments are
//! never inlined; a DTO only says whether one exists (`has_*` flags) and the
//! bytes travel through the attachment endpoints, keyed by the server-side
//! object id and a symbolic attachment name.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityId;
use super::filter::FilterPresetSettings;
use super::game::Link;

/// The three binary attachment slots games and platforms own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Icon,
    CoverImage,
    BackgroundImage,
}

impl AttachmentKind {
    pub const ALL: [Self; 3] = [Self::Icon, Self::CoverImage, Self::BackgroundImage];

    /// The symbolic name used in `changedFields`, multipart part names and
    /// attachment requests
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Icon => "Icon",
            Self::CoverImage => "CoverImage",
            Self::BackgroundImage => "BackgroundImage",
        }
    }
}

/// A reference entry inside an association list: the identity that matters
/// plus a display name for server-side logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl NamedRef {
    #[must_use]
    pub const fn bare(id: EntityId) -> Self {
        Self { id, name: None }
    }
}

/// Full DTO for the plain named kinds; `specification_id` rides along for
/// regions only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedItemDto {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification_id: Option<String>,
}

/// Full DTO for a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDto {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification_id: Option<String>,
    #[serde(default)]
    pub has_icon: bool,
    #[serde(default)]
    pub has_cover_image: bool,
    #[serde(default)]
    pub has_background_image: bool,
}

impl PlatformDto {
    /// Whether the given attachment slot is populated on the sender's side
    #[must_use]
    pub const fn has_attachment(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Icon => self.has_icon,
            AttachmentKind::CoverImage => self.has_cover_image,
            AttachmentKind::BackgroundImage => self.has_background_image,
        }
    }
}

/// Full DTO for a game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDto {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<Uuid>,
    #[serde(default)]
    pub include_library_plugin_action: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publishers: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developers: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_ratings: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<NamedRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_status: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_size_scan_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub playtime: u64,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_score: Option<i32>,
    #[serde(default)]
    pub has_icon: bool,
    #[serde(default)]
    pub has_cover_image: bool,
    #[serde(default)]
    pub has_background_image: bool,
}

impl GameDto {
    /// Whether the given attachment slot is populated on the sender's side
    #[must_use]
    pub const fn has_attachment(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Icon => self.has_icon,
            AttachmentKind::CoverImage => self.has_cover_image,
            AttachmentKind::BackgroundImage => self.has_background_image,
        }
    }
}

/// Full DTO for a filter preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPresetDto {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<FilterPresetSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting_order_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_order: Option<String>,
    #[serde(default)]
    pub show_in_fullscreen_quick_selection: bool,
}
