//! Wire mapping for games, full and diff forms
//!
//! The diff side carries the play-session deltas: when a change is observed
//! while a game transitions out of a running or launching state, the playtime
//! move is reported both as an absolute value and as elapsed seconds, and a
//! play-count move is reported as a delta when a session starts. The deltas
//! feed server-side aggregation; applying a diff always uses the absolute
//! payloads.

use crate::models::{field, Game, GameDiffDto, GameDto, ObjectType};

use super::{ids_changed, ref_ids, resolve_ref, resolve_refs, NameResolver};

#[must_use]
pub fn to_dto(game: &Game, names: &dyn NameResolver) -> GameDto {
    GameDto {
        id: game.id,
        name: Some(game.name.clone()),
        removed: false,
        sorting_name: game.sorting_name.clone(),
        description: game.description.clone(),
        notes: game.notes.clone(),
        manual: game.manual.clone(),
        version: game.version.clone(),
        game_id: game.game_id.clone(),
        plugin_id: game.plugin_id,
        include_library_plugin_action: game.include_library_plugin_action,
        hidden: game.hidden,
        favorite: game.favorite,
        genres: Some(resolve_refs(names, ObjectType::Genre, &game.genre_ids)),
        platforms: Some(resolve_refs(names, ObjectType::Platform, &game.platform_ids)),
        publishers: Some(resolve_refs(names, ObjectType::Company, &game.publisher_ids)),
        developers: Some(resolve_refs(names, ObjectType::Company, &game.developer_ids)),
        categories: Some(resolve_refs(names, ObjectType::Category, &game.category_ids)),
        tags: Some(resolve_refs(names, ObjectType::Tag, &game.tag_ids)),
        features: Some(resolve_refs(names, ObjectType::Feature, &game.feature_ids)),
        series: Some(resolve_refs(names, ObjectType::Series, &game.series_ids)),
        age_ratings: Some(resolve_refs(names, ObjectType::AgeRating, &game.age_rating_ids)),
        regions: Some(resolve_refs(names, ObjectType::Region, &game.region_ids)),
        source: resolve_ref(names, ObjectType::Source, game.source_id),
        completion_status: resolve_ref(
            names,
            ObjectType::CompletionStatus,
            game.completion_status_id,
        ),
        links: Some(game.links.clone()),
        release_date: game.release_date,
        last_activity: game.last_activity,
        added: game.added,
        modified: game.modified,
        last_size_scan_date: game.last_size_scan_date,
        playtime: game.playtime,
        play_count: game.play_count,
        install_size: game.install_size,
        user_score: game.user_score,
        critic_score: game.critic_score,
        community_score: game.community_score,
        has_icon: game.icon.is_some(),
        has_cover_image: game.cover_image.is_some(),
        has_background_image: game.background_image.is_some(),
    }
}

/// Overwrite `game` with the DTO's fields.
///
/// Association lists are replaced wholesale. `added` and `modified` are only
/// taken when the DTO carries them, so a peer that never stamped them cannot
/// erase local stamps. Attachment handles and session flags stay untouched.
pub fn fill(game: &mut Game, dto: &GameDto) {
    game.id = dto.id;
    game.name = dto.name.clone().unwrap_or_default();
    game.sorting_name = dto.sorting_name.clone();
    game.description = dto.description.clone();
    game.notes = dto.notes.clone();
    game.manual = dto.manual.clone();
    game.version = dto.version.clone();
    game.game_id = dto.game_id.clone();
    game.plugin_id = dto.plugin_id;
    game.include_library_plugin_action = dto.include_library_plugin_action;
    game.hidden = dto.hidden;
    game.favorite = dto.favorite;
    game.genre_ids = ref_ids(dto.genres.as_deref());
    game.platform_ids = ref_ids(dto.platforms.as_deref());
    game.publisher_ids = ref_ids(dto.publishers.as_deref());
    game.developer_ids = ref_ids(dto.developers.as_deref());
    game.category_ids = ref_ids(dto.categories.as_deref());
    game.tag_ids = ref_ids(dto.tags.as_deref());
    game.feature_ids = ref_ids(dto.features.as_deref());
    game.series_ids = ref_ids(dto.series.as_deref());
    game.age_rating_ids = ref_ids(dto.age_ratings.as_deref());
    game.region_ids = ref_ids(dto.regions.as_deref());
    game.source_id = dto.source.as_ref().map(|named| named.id);
    game.completion_status_id = dto.completion_status.as_ref().map(|named| named.id);
    game.links = dto.links.clone().unwrap_or_default();
    game.release_date = dto.release_date;
    game.last_activity = dto.last_activity;
    if dto.added.is_some() {
        game.added = dto.added;
    }
    if dto.modified.is_some() {
        game.modified = dto.modified;
    }
    game.playtime = dto.playtime;
    game.play_count = dto.play_count;
    game.install_size = dto.install_size;
    game.last_size_scan_date = dto.last_size_scan_date;
    game.user_score = dto.user_score;
    game.critic_score = dto.critic_score;
    game.community_score = dto.community_score;
}

/// Whether the DTO describes a different state than the local game,
/// attachment presence included
#[must_use]
pub fn differs(game: &Game, dto: &GameDto) -> bool {
    dto.has_icon != game.icon.is_some()
        || dto.has_cover_image != game.cover_image.is_some()
        || dto.has_background_image != game.background_image.is_some()
        || dto.name.as_deref().unwrap_or_default() != game.name
        || dto.description != game.description
        || dto.notes != game.notes
        || ids_changed(&game.genre_ids, &ref_ids(dto.genres.as_deref()))
        || dto.hidden != game.hidden
        || dto.favorite != game.favorite
        || dto.last_activity != game.last_activity
        || dto.sorting_name != game.sorting_name
        || dto.game_id != game.game_id
        || dto.plugin_id != game.plugin_id
        || dto.include_library_plugin_action != game.include_library_plugin_action
        || ids_changed(&game.platform_ids, &ref_ids(dto.platforms.as_deref()))
        || ids_changed(&game.publisher_ids, &ref_ids(dto.publishers.as_deref()))
        || ids_changed(&game.developer_ids, &ref_ids(dto.developers.as_deref()))
        || dto.release_date != game.release_date
        || ids_changed(&game.category_ids, &ref_ids(dto.categories.as_deref()))
        || ids_changed(&game.tag_ids, &ref_ids(dto.tags.as_deref()))
        || ids_changed(&game.feature_ids, &ref_ids(dto.features.as_deref()))
        || dto.links.as_deref().unwrap_or_default() != game.links
        || dto.playtime != game.playtime
        || dto.added != game.added
        || dto.modified != game.modified
        || dto.play_count != game.play_count
        || dto.install_size != game.install_size
        || dto.last_size_scan_date != game.last_size_scan_date
        || ids_changed(&game.series_ids, &ref_ids(dto.series.as_deref()))
        || dto.version != game.version
        || ids_changed(&game.age_rating_ids, &ref_ids(dto.age_ratings.as_deref()))
        || ids_changed(&game.region_ids, &ref_ids(dto.regions.as_deref()))
        || dto.source.as_ref().map(|named| named.id) != game.source_id
        || dto.completion_status.as_ref().map(|named| named.id) != game.completion_status_id
        || dto.user_score != game.user_score
        || dto.critic_score != game.critic_score
        || dto.community_score != game.community_score
        || dto.manual != game.manual
}

/// Diff between two local snapshots of the same game.
///
/// Identity fields always ride on the DTO so the receiving side can locate
/// the game even when nothing about the identity changed.
#[must_use]
pub fn compute_diff(old: &Game, new: &Game, names: &dyn NameResolver) -> GameDiffDto {
    let mut dto = GameDiffDto {
        id: new.id,
        name: Some(new.name.clone()),
        game_id: new.game_id.clone(),
        plugin_id: new.plugin_id,
        ..GameDiffDto::default()
    };
    if old.id != new.id {
        dto.changed_fields.push(field::ID.into());
    }
    if old.name != new.name {
        dto.changed_fields.push(field::NAME.into());
    }
    if old.description != new.description {
        dto.description = new.description.clone();
        dto.changed_fields.push(field::DESCRIPTION.into());
    }
    if old.notes != new.notes {
        dto.notes = new.notes.clone();
        dto.changed_fields.push(field::NOTES.into());
    }
    if ids_changed(&old.genre_ids, &new.genre_ids) {
        dto.genres = Some(resolve_refs(names, ObjectType::Genre, &new.genre_ids));
        dto.changed_fields.push(field::GENRES.into());
    }
    if old.hidden != new.hidden {
        dto.hidden = Some(new.hidden);
        dto.changed_fields.push(field::HIDDEN.into());
    }
    if old.favorite != new.favorite {
        dto.favorite = Some(new.favorite);
        dto.changed_fields.push(field::FAVORITE.into());
    }
    if old.last_activity != new.last_activity {
        dto.last_activity = new.last_activity;
        dto.changed_fields.push(field::LAST_ACTIVITY.into());
    }
    if old.sorting_name != new.sorting_name {
        dto.sorting_name = new.sorting_name.clone();
        dto.changed_fields.push(field::SORTING_NAME.into());
    }
    if old.game_id != new.game_id {
        dto.changed_fields.push(field::GAME_ID.into());
    }
    if old.plugin_id != new.plugin_id {
        dto.changed_fields.push(field::PLUGIN_ID.into());
    }
    if old.include_library_plugin_action != new.include_library_plugin_action {
        dto.include_library_plugin_action = Some(new.include_library_plugin_action);
        dto.changed_fields
            .push(field::INCLUDE_LIBRARY_PLUGIN_ACTION.into());
    }
    if ids_changed(&old.platform_ids, &new.platform_ids) {
        dto.platforms = Some(resolve_refs(names, ObjectType::Platform, &new.platform_ids));
        dto.changed_fields.push(field::PLATFORMS.into());
    }
    if ids_changed(&old.publisher_ids, &new.publisher_ids) {
        dto.publishers = Some(resolve_refs(names, ObjectType::Company, &new.publisher_ids));
        dto.changed_fields.push(field::PUBLISHERS.into());
    }
    if ids_changed(&old.developer_ids, &new.developer_ids) {
        dto.developers = Some(resolve_refs(names, ObjectType::Company, &new.developer_ids));
        dto.changed_fields.push(field::DEVELOPERS.into());
    }
    if old.release_date != new.release_date {
        dto.release_date = new.release_date;
        dto.changed_fields.push(field::RELEASE_DATE.into());
    }
    if ids_changed(&old.category_ids, &new.category_ids) {
        dto.categories = Some(resolve_refs(names, ObjectType::Category, &new.category_ids));
        dto.changed_fields.push(field::CATEGORIES.into());
    }
    if ids_changed(&old.tag_ids, &new.tag_ids) {
        dto.tags = Some(resolve_refs(names, ObjectType::Tag, &new.tag_ids));
        dto.changed_fields.push(field::TAGS.into());
    }
    if ids_changed(&old.feature_ids, &new.feature_ids) {
        dto.features = Some(resolve_refs(names, ObjectType::Feature, &new.feature_ids));
        dto.changed_fields.push(field::FEATURES.into());
    }
    if old.links != new.links {
        dto.links = Some(new.links.clone());
        dto.changed_fields.push(field::LINKS.into());
    }
    if old.playtime != new.playtime {
        dto.playtime = Some(new.playtime);
        if session_ended(old, new) {
            dto.playtime_diff = Some(counter_delta(old.playtime, new.playtime));
        }
        dto.changed_fields.push(field::PLAYTIME.into());
    }
    if old.added != new.added {
        dto.added = new.added;
        dto.changed_fields.push(field::ADDED.into());
    }
    if old.modified != new.modified {
        dto.modified = new.modified;
        dto.changed_fields.push(field::MODIFIED.into());
    }
    if old.play_count != new.play_count {
        dto.play_count = Some(new.play_count);
        if new.is_running && !old.is_running {
            dto.play_count_diff = Some(counter_delta(old.play_count, new.play_count));
        }
        dto.changed_fields.push(field::PLAY_COUNT.into());
    }
    if old.install_size != new.install_size {
        dto.install_size = new.install_size;
        dto.changed_fields.push(field::INSTALL_SIZE.into());
    }
    if old.last_size_scan_date != new.last_size_scan_date {
        dto.last_size_scan_date = new.last_size_scan_date;
        dto.changed_fields.push(field::LAST_SIZE_SCAN_DATE.into());
    }
    if ids_changed(&old.series_ids, &new.series_ids) {
        dto.series = Some(resolve_refs(names, ObjectType::Series, &new.series_ids));
        dto.changed_fields.push(field::SERIES.into());
    }
    if old.version != new.version {
        dto.version = new.version.clone();
        dto.changed_fields.push(field::VERSION.into());
    }
    if ids_changed(&old.age_rating_ids, &new.age_rating_ids) {
        dto.age_ratings = Some(resolve_refs(names, ObjectType::AgeRating, &new.age_rating_ids));
        dto.changed_fields.push(field::AGE_RATINGS.into());
    }
    if ids_changed(&old.region_ids, &new.region_ids) {
        dto.regions = Some(resolve_refs(names, ObjectType::Region, &new.region_ids));
        dto.changed_fields.push(field::REGIONS.into());
    }
    if old.source_id != new.source_id {
        dto.source = resolve_ref(names, ObjectType::Source, new.source_id);
        dto.changed_fields.push(field::SOURCE.into());
    }
    if old.completion_status_id != new.completion_status_id {
        dto.completion_status =
            resolve_ref(names, ObjectType::CompletionStatus, new.completion_status_id);
        dto.changed_fields.push(field::COMPLETION_STATUS.into());
    }
    if old.user_score != new.user_score {
        dto.user_score = new.user_score;
        dto.changed_fields.push(field::USER_SCORE.into());
    }
    if old.critic_score != new.critic_score {
        dto.critic_score = new.critic_score;
        dto.changed_fields.push(field::CRITIC_SCORE.into());
    }
    if old.community_score != new.community_score {
        dto.community_score = new.community_score;
        dto.changed_fields.push(field::COMMUNITY_SCORE.into());
    }
    if old.manual != new.manual {
        dto.manual = new.manual.clone();
        dto.changed_fields.push(field::MANUAL.into());
    }
    if old.icon != new.icon {
        dto.changed_fields.push(field::ICON.into());
    }
    if old.cover_image != new.cover_image {
        dto.changed_fields.push(field::COVER_IMAGE.into());
    }
    if old.background_image != new.background_image {
        dto.changed_fields.push(field::BACKGROUND_IMAGE.into());
    }
    dto
}

/// Apply a diff's named fields. Identity fields always follow the DTO; a
/// named field with a missing payload is an explicit clear, except `added`
/// and `modified` which are never cleared.
pub fn apply_diff(game: &mut Game, dto: &GameDiffDto) {
    game.id = dto.id;
    game.game_id = dto.game_id.clone();
    game.plugin_id = dto.plugin_id;
    if dto.changed(field::NAME) {
        game.name = dto.name.clone().unwrap_or_default();
    }
    if dto.changed(field::DESCRIPTION) {
        game.description = dto.description.clone();
    }
    if dto.changed(field::NOTES) {
        game.notes = dto.notes.clone();
    }
    if dto.changed(field::GENRES) {
        game.genre_ids = ref_ids(dto.genres.as_deref());
    }
    if dto.changed(field::HIDDEN) {
        game.hidden = dto.hidden.unwrap_or_default();
    }
    if dto.changed(field::FAVORITE) {
        game.favorite = dto.favorite.unwrap_or_default();
    }
    if dto.changed(field::LAST_ACTIVITY) {
        game.last_activity = dto.last_activity;
    }
    if dto.changed(field::SORTING_NAME) {
        game.sorting_name = dto.sorting_name.clone();
    }
    if dto.changed(field::INCLUDE_LIBRARY_PLUGIN_ACTION) {
        game.include_library_plugin_action = dto.include_library_plugin_action.unwrap_or_default();
    }
    if dto.changed(field::PLATFORMS) {
        game.platform_ids = ref_ids(dto.platforms.as_deref());
    }
    if dto.changed(field::PUBLISHERS) {
        game.publisher_ids = ref_ids(dto.publishers.as_deref());
    }
    if dto.changed(field::DEVELOPERS) {
        game.developer_ids = ref_ids(dto.developers.as_deref());
    }
    if dto.changed(field::RELEASE_DATE) {
        game.release_date = dto.release_date;
    }
    if dto.changed(field::CATEGORIES) {
        game.category_ids = ref_ids(dto.categories.as_deref());
    }
    if dto.changed(field::TAGS) {
        game.tag_ids = ref_ids(dto.tags.as_deref());
    }
    if dto.changed(field::FEATURES) {
        game.feature_ids = ref_ids(dto.features.as_deref());
    }
    if dto.changed(field::LINKS) {
        game.links = dto.links.clone().unwrap_or_default();
    }
    if dto.changed(field::PLAYTIME) {
        game.playtime = dto.playtime.unwrap_or_default();
    }
    if dto.changed(field::ADDED) && dto.added.is_some() {
        game.added = dto.added;
    }
    if dto.changed(field::MODIFIED) && dto.modified.is_some() {
        game.modified = dto.modified;
    }
    if dto.changed(field::PLAY_COUNT) {
        game.play_count = dto.play_count.unwrap_or_default();
    }
    if dto.changed(field::INSTALL_SIZE) {
        game.install_size = dto.install_size;
    }
    if dto.changed(field::LAST_SIZE_SCAN_DATE) {
        game.last_size_scan_date = dto.last_size_scan_date;
    }
    if dto.changed(field::SERIES) {
        game.series_ids = ref_ids(dto.series.as_deref());
    }
    if dto.changed(field::VERSION) {
        game.version = dto.version.clone();
    }
    if dto.changed(field::AGE_RATINGS) {
        game.age_rating_ids = ref_ids(dto.age_ratings.as_deref());
    }
    if dto.changed(field::REGIONS) {
        game.region_ids = ref_ids(dto.regions.as_deref());
    }
    if dto.changed(field::SOURCE) {
        game.source_id = dto.source.as_ref().map(|named| named.id);
    }
    if dto.changed(field::COMPLETION_STATUS) {
        game.completion_status_id = dto.completion_status.as_ref().map(|named| named.id);
    }
    if dto.changed(field::USER_SCORE) {
        game.user_score = dto.user_score;
    }
    if dto.changed(field::CRITIC_SCORE) {
        game.critic_score = dto.critic_score;
    }
    if dto.changed(field::COMMUNITY_SCORE) {
        game.community_score = dto.community_score;
    }
    if dto.changed(field::MANUAL) {
        game.manual = dto.manual.clone();
    }
}

/// A play session just ended: the game left a running or launching state
const fn session_ended(old: &Game, new: &Game) -> bool {
    (old.is_running || old.is_launching) && !new.is_running && !new.is_launching
}

fn counter_delta(old: u64, new: u64) -> i64 {
    let old = i64::try_from(old).unwrap_or(i64::MAX);
    let new = i64::try_from(new).unwrap_or(i64::MAX);
    new.saturating_sub(old)
}
