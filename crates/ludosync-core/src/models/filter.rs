//! Filter preset model
//!
//! Filter presets are both synchronizable entities and holders of references
//! to other entities (their per-kind id filters), so identity reassignment
//! has to rewrite them the same way it rewrites games. The nested settings
//! struct doubles as its own wire representation; lists are kept sorted so
//! equality checks are order-insensitive.

use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use super::object_type::ObjectType;

/// An id-list filter over one entity kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<EntityId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A free-text value filter (release year)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StringFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// A bucketed numeric filter (scores, activity ranges, sizes)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<i32>>,
}

/// The filter configuration of a preset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterPresetSettings {
    pub use_and_filtering_style: bool,
    pub is_installed: bool,
    pub is_un_installed: bool,
    pub hidden: bool,
    pub favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<StringFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_rating: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_statuses: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<IdFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_score: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critic_score: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_score: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_activity: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_time: Option<IntFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_size: Option<IntFilter>,
}

impl FilterPresetSettings {
    /// Sort every list in place so equality is order-insensitive
    pub fn normalize(&mut self) {
        if let Some(filter) = self.release_year.as_mut() {
            if let Some(values) = filter.values.as_mut() {
                values.sort_unstable();
            }
        }
        for filter in self.id_filters_mut().into_iter().flatten() {
            if let Some(ids) = filter.ids.as_mut() {
                ids.sort_unstable();
            }
        }
        for filter in self.int_filters_mut().into_iter().flatten() {
            if let Some(values) = filter.values.as_mut() {
                values.sort_unstable();
            }
        }
    }

    /// Whether any id filter for `target` names `id`
    #[must_use]
    pub fn references(&self, target: ObjectType, id: EntityId) -> bool {
        self.filters_for(target).iter().any(|filter| {
            filter
                .ids
                .as_ref()
                .is_some_and(|ids| ids.contains(&id))
        })
    }

    /// Rewrite every `target`-typed filter entry from `old` to `new`.
    /// Returns true if anything was rewritten.
    pub fn reassign(&mut self, target: ObjectType, old: EntityId, new: EntityId) -> bool {
        let mut changed = false;
        for filter in self.filters_for_mut(target) {
            if let Some(ids) = filter.ids.as_mut() {
                if ids.contains(&old) {
                    ids.retain(|id| *id != old);
                    if !ids.contains(&new) {
                        ids.push(new);
                    }
                    ids.sort_unstable();
                    changed = true;
                }
            }
        }
        changed
    }

    /// The id filters affected by a `target`-typed entity. Companies span
    /// both the publisher and the developer filter.
    fn filters_for(&self, target: ObjectType) -> Vec<&IdFilter> {
        let slots: &[&Option<IdFilter>] = match target.base() {
            ObjectType::Category => &[&self.category],
            ObjectType::Genre => &[&self.genre],
            ObjectType::Company => &[&self.publisher, &self.developer],
            ObjectType::Feature => &[&self.feature],
            ObjectType::Tag => &[&self.tag],
            ObjectType::Series => &[&self.series],
            ObjectType::AgeRating => &[&self.age_rating],
            ObjectType::Region => &[&self.region],
            ObjectType::Platform => &[&self.platform],
            ObjectType::Source => &[&self.source],
            ObjectType::CompletionStatus => &[&self.completion_statuses],
            _ => &[],
        };
        slots.iter().filter_map(|slot| slot.as_ref()).collect()
    }

    fn filters_for_mut(&mut self, target: ObjectType) -> Vec<&mut IdFilter> {
        let slots: Vec<&mut Option<IdFilter>> = match target.base() {
            ObjectType::Category => vec![&mut self.category],
            ObjectType::Genre => vec![&mut self.genre],
            ObjectType::Company => vec![&mut self.publisher, &mut self.developer],
            ObjectType::Feature => vec![&mut self.feature],
            ObjectType::Tag => vec![&mut self.tag],
            ObjectType::Series => vec![&mut self.series],
            ObjectType::AgeRating => vec![&mut self.age_rating],
            ObjectType::Region => vec![&mut self.region],
            ObjectType::Platform => vec![&mut self.platform],
            ObjectType::Source => vec![&mut self.source],
            ObjectType::CompletionStatus => vec![&mut self.completion_statuses],
            _ => Vec::new(),
        };
        slots.into_iter().filter_map(|slot| slot.as_mut()).collect()
    }

    fn id_filters_mut(&mut self) -> [&mut Option<IdFilter>; 13] {
        [
            &mut self.genre,
            &mut self.platform,
            &mut self.publisher,
            &mut self.developer,
            &mut self.category,
            &mut self.tag,
            &mut self.series,
            &mut self.region,
            &mut self.source,
            &mut self.age_rating,
            &mut self.library,
            &mut self.completion_statuses,
            &mut self.feature,
        ]
    }

    fn int_filters_mut(&mut self) -> [&mut Option<IntFilter>; 9] {
        [
            &mut self.user_score,
            &mut self.critic_score,
            &mut self.community_score,
            &mut self.last_activity,
            &mut self.recent_activity,
            &mut self.added,
            &mut self.modified,
            &mut self.play_time,
            &mut self.install_size,
        ]
    }
}

/// A saved library view: filter settings plus sorting and grouping choices.
///
/// Sorting and grouping fields are carried as opaque strings; the engine
/// never interprets them, it only compares and copies them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPreset {
    pub id: EntityId,
    pub name: String,
    pub settings: Option<FilterPresetSettings>,
    pub sorting_order: Option<String>,
    pub sorting_order_direction: Option<String>,
    pub grouping_order: Option<String>,
    pub show_in_fullscreen_quick_selection: bool,
}

impl FilterPreset {
    /// Create a new preset with a fresh identity
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether any filter in this preset names `id`
    #[must_use]
    pub fn references(&self, target: ObjectType, id: EntityId) -> bool {
        self.settings
            .as_ref()
            .is_some_and(|settings| settings.references(target, id))
    }

    /// Rewrite filter references from `old` to `new`; true if anything changed
    pub fn reassign(&mut self, target: ObjectType, old: EntityId, new: EntityId) -> bool {
        self.settings
            .as_mut()
            .is_some_and(|settings| settings.reassign(target, old, new))
    }
}
