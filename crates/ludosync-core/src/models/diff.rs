//! Incremental wire representations
//!
//! A diff DTO carries only the fields whose values changed between two local
//! snapshots, plus the authoritative `changedFields` name set. Consumers must
//! key every read off `changedFields`: a missing payload for a named field is
//! an explicit clear, while a field not named must never be touched, whatever
//! its payload holds. `base_object_id` is the server-side handle of the full
//! object, used to fall back to a full fetch when the diff cannot be matched
//! locally.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dto::NamedRef;
use super::entity::EntityId;
use super::game::Link;

/// Symbolic field names carried in `changedFields` sets
pub mod field {
    pub const ID: &str = "Id";
    pub const NAME: &str = "Name";
    pub const SPECIFICATION_ID: &str = "SpecificationId";
    pub const DESCRIPTION: &str = "Description";
    pub const NOTES: &str = "Notes";
    pub const GENRES: &str = "Genres";
    pub const HIDDEN: &str = "Hidden";
    pub const FAVORITE: &str = "Favorite";
    pub const LAST_ACTIVITY: &str = "LastActivity";
    pub const SORTING_NAME: &str = "SortingName";
    pub const GAME_ID: &str = "GameId";
    pub const PLUGIN_ID: &str = "PluginId";
    pub const INCLUDE_LIBRARY_PLUGIN_ACTION: &str = "IncludeLibraryPluginAction";
    pub const PLATFORMS: &str = "Platforms";
    pub const PUBLISHERS: &str = "Publishers";
    pub const DEVELOPERS: &str = "Developers";
    pub const RELEASE_DATE: &str = "ReleaseDate";
    pub const CATEGORIES: &str = "Categories";
    pub const TAGS: &str = "Tags";
    pub const FEATURES: &str = "Features";
    pub const LINKS: &str = "Links";
    pub const PLAYTIME: &str = "Playtime";
    pub const ADDED: &str = "Added";
    pub const MODIFIED: &str = "Modified";
    pub const PLAY_COUNT: &str = "PlayCount";
    pub const INSTALL_SIZE: &str = "InstallSize";
    pub const LAST_SIZE_SCAN_DATE: &str = "LastSizeScanDate";
    pub const SERIES: &str = "Series";
    pub const VERSION: &str = "Version";
    pub const AGE_RATINGS: &str = "AgeRatings";
    pub const REGIONS: &str = "Regions";
    pub const SOURCE: &str = "Source";
    pub const COMPLETION_STATUS: &str = "CompletionStatus";
    pub const USER_SCORE: &str = "UserScore";
    pub const CRITIC_SCORE: &str = "CriticScore";
    pub const COMMUNITY_SCORE: &str = "CommunityScore";
    pub const MANUAL: &str = "Manual";
    pub const ICON: &str = "Icon";
    pub const COVER_IMAGE: &str = "CoverImage";
    pub const BACKGROUND_IMAGE: &str = "BackgroundImage";
}

/// Diff DTO for a platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDiffDto {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub base_object_id: i64,
    #[serde(default)]
    pub changed_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification_id: Option<String>,
}

impl PlatformDiffDto {
    /// Whether `changedFields` names the given field
    #[must_use]
    pub fn changed(&self, field: &str) -> bool {
        self.changed_fields.iter().any(|name| name == field)
    }
}

/// Diff DTO for a game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDiffDto {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub base_object_id: i64,
    #[serde(default)]
    pub changed_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_id: Option<Uuid>,
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
    pub include_library_plugin_action: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playtime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playtime_diff: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_count_diff: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_score: Option<i32>,
}

impl GameDiffDto {
    /// Whether `changedFields` names the given field
    #[must_use]
    pub fn changed(&self, field: &str) -> bool {
        self.changed_fields.iter().any(|name| name == field)
    }
}
