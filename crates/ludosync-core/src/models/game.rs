//! Game model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dto::AttachmentKind;
use super::entity::EntityId;
use super::object_type::ObjectType;

/// A named URL attached to a game. Link lists are order-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Link {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: Some(url.into()),
        }
    }
}

/// A game in the library.
///
/// `game_id` and `plugin_id` together form the provider identity: the id the
/// source store/launcher plugin knows the game by. Two clients importing the
/// same store library produce the same pair with different entity ids, which
/// is what the identity reconciliation path keys on.
///
/// `is_running` and `is_launching` are transient session state; they are never
/// part of a wire payload but feed the play-session delta rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: EntityId,
    pub name: String,
    pub sorting_name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub manual: Option<String>,
    pub version: Option<String>,
    pub game_id: Option<String>,
    pub plugin_id: Option<Uuid>,
    pub include_library_plugin_action: bool,
    pub hidden: bool,
    pub favorite: bool,
    pub genre_ids: Vec<EntityId>,
    pub platform_ids: Vec<EntityId>,
    pub publisher_ids: Vec<EntityId>,
    pub developer_ids: Vec<EntityId>,
    pub category_ids: Vec<EntityId>,
    pub tag_ids: Vec<EntityId>,
    pub feature_ids: Vec<EntityId>,
    pub series_ids: Vec<EntityId>,
    pub age_rating_ids: Vec<EntityId>,
    pub region_ids: Vec<EntityId>,
    pub source_id: Option<EntityId>,
    pub completion_status_id: Option<EntityId>,
    pub links: Vec<Link>,
    pub release_date: Option<NaiveDate>,
    pub last_activity: Option<DateTime<Utc>>,
    pub added: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub last_size_scan_date: Option<DateTime<Utc>>,
    pub playtime: u64,
    pub play_count: u64,
    pub install_size: Option<u64>,
    pub user_score: Option<i32>,
    pub critic_score: Option<i32>,
    pub community_score: Option<i32>,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub background_image: Option<String>,
    pub is_running: bool,
    pub is_launching: bool,
}

impl Game {
    /// Create a new game with a fresh identity
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether this game's provider identity matches the given pair
    #[must_use]
    pub fn matches_provider(&self, game_id: Option<&str>, plugin_id: Option<Uuid>) -> bool {
        self.game_id.as_deref() == game_id && self.plugin_id == plugin_id
    }

    /// Whether this game references `id` as a `target`-typed association
    #[must_use]
    pub fn references(&self, target: ObjectType, id: EntityId) -> bool {
        match target.base() {
            ObjectType::Category => self.category_ids.contains(&id),
            ObjectType::Genre => self.genre_ids.contains(&id),
            ObjectType::Company => {
                self.publisher_ids.contains(&id) || self.developer_ids.contains(&id)
            }
            ObjectType::Feature => self.feature_ids.contains(&id),
            ObjectType::Tag => self.tag_ids.contains(&id),
            ObjectType::Series => self.series_ids.contains(&id),
            ObjectType::AgeRating => self.age_rating_ids.contains(&id),
            ObjectType::Region => self.region_ids.contains(&id),
            ObjectType::Platform => self.platform_ids.contains(&id),
            ObjectType::Source => self.source_id == Some(id),
            ObjectType::CompletionStatus => self.completion_status_id == Some(id),
            _ => false,
        }
    }

    /// The storage handle held by an attachment slot
    #[must_use]
    pub fn attachment(&self, kind: AttachmentKind) -> Option<&str> {
        match kind {
            AttachmentKind::Icon => self.icon.as_deref(),
            AttachmentKind::CoverImage => self.cover_image.as_deref(),
            AttachmentKind::BackgroundImage => self.background_image.as_deref(),
        }
    }

    pub fn attachment_mut(&mut self, kind: AttachmentKind) -> &mut Option<String> {
        match kind {
            AttachmentKind::Icon => &mut self.icon,
            AttachmentKind::CoverImage => &mut self.cover_image,
            AttachmentKind::BackgroundImage => &mut self.background_image,
        }
    }

    /// Rewrite every `target`-typed reference from `old` to `new`.
    /// Returns true if anything was rewritten.
    pub fn reassign(&mut self, target: ObjectType, old: EntityId, new: EntityId) -> bool {
        match target.base() {
            ObjectType::Category => reassign_in(&mut self.category_ids, old, new),
            ObjectType::Genre => reassign_in(&mut self.genre_ids, old, new),
            ObjectType::Company => {
                let publishers = reassign_in(&mut self.publisher_ids, old, new);
                let developers = reassign_in(&mut self.developer_ids, old, new);
                publishers || developers
            }
            ObjectType::Feature => reassign_in(&mut self.feature_ids, old, new),
            ObjectType::Tag => reassign_in(&mut self.tag_ids, old, new),
            ObjectType::Series => reassign_in(&mut self.series_ids, old, new),
            ObjectType::AgeRating => reassign_in(&mut self.age_rating_ids, old, new),
            ObjectType::Region => reassign_in(&mut self.region_ids, old, new),
            ObjectType::Platform => reassign_in(&mut self.platform_ids, old, new),
            ObjectType::Source => reassign_single(&mut self.source_id, old, new),
            ObjectType::CompletionStatus => {
                reassign_single(&mut self.completion_status_id, old, new)
            }
            _ => false,
        }
    }
}

fn reassign_in(ids: &mut Vec<EntityId>, old: EntityId, new: EntityId) -> bool {
    if ids.contains(&old) {
        ids.retain(|id| *id != old);
        if !ids.contains(&new) {
            ids.push(new);
        }
        true
    } else {
        false
    }
}

fn reassign_single(slot: &mut Option<EntityId>, old: EntityId, new: EntityId) -> bool {
    if *slot == Some(old) {
        *slot = Some(new);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reassign_rewrites_list_references() {
        let old = EntityId::new();
        let new = EntityId::new();
        let keep = EntityId::new();
        let mut game = Game::new("Outer Wilds");
        game.genre_ids = vec![keep, old];

        assert!(game.reassign(ObjectType::Genre, old, new));
        assert_eq!(game.genre_ids, vec![keep, new]);
        assert!(!game.reassign(ObjectType::Genre, old, new));
    }

    #[test]
    fn reassign_never_duplicates_an_existing_reference() {
        let old = EntityId::new();
        let new = EntityId::new();
        let mut game = Game::new("Baba Is You");
        game.tag_ids = vec![old, new];

        assert!(game.reassign(ObjectType::Tag, old, new));
        assert_eq!(game.tag_ids, vec![new]);
    }

    #[test]
    fn reassign_covers_both_company_roles() {
        let old = EntityId::new();
        let new = EntityId::new();
        let mut game = Game::new("Hades");
        game.publisher_ids = vec![old];
        game.developer_ids = vec![old];

        assert!(game.reassign(ObjectType::Company, old, new));
        assert_eq!(game.publisher_ids, vec![new]);
        assert_eq!(game.developer_ids, vec![new]);
    }

    #[test]
    fn single_reference_reassigns_only_on_match() {
        let old = EntityId::new();
        let new = EntityId::new();
        let mut game = Game::new("Celeste");
        game.source_id = Some(old);

        assert!(game.references(ObjectType::Source, old));
        assert!(game.reassign(ObjectType::Source, old, new));
        assert_eq!(game.source_id, Some(new));
        assert!(!game.references(ObjectType::Source, old));
    }

    #[test]
    fn diff_typed_targets_resolve_to_their_base() {
        let id = EntityId::new();
        let mut game = Game::new("Factorio");
        game.platform_ids = vec![id];
        assert!(game.references(ObjectType::PlatformDiff, id));
    }
}
