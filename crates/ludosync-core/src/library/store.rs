//! In-process library storage
//!
//! The store owns every synchronizable collection, hands out owned clones
//! and publishes a [`StoreEvent`] for each mutation. Observers run on the
//! mutating thread after the collection lock is back down, so an observer
//! may re-enter the store. State persists as a JSON snapshot next to the
//! rest of the client state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::NameResolver;
use crate::models::{EntityId, FilterPreset, Game, NamedItem, NamedKind, ObjectType, Platform};
use crate::{Error, Result};

/// A record in one of the synchronized collections
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryRecord {
    Named(NamedKind, NamedItem),
    Platform(Platform),
    Game(Box<Game>),
    FilterPreset(Box<FilterPreset>),
}

impl LibraryRecord {
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Named(kind, _) => kind.object_type(),
            Self::Platform(_) => ObjectType::Platform,
            Self::Game(_) => ObjectType::Game,
            Self::FilterPreset(_) => ObjectType::FilterPreset,
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Named(_, item) => item.id,
            Self::Platform(platform) => platform.id,
            Self::Game(game) => game.id,
            Self::FilterPreset(preset) => preset.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Named(_, item) => &item.name,
            Self::Platform(platform) => &platform.name,
            Self::Game(game) => &game.name,
            Self::FilterPreset(preset) => &preset.name,
        }
    }
}

/// A mutation observed on the store
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Added(LibraryRecord),
    Updated {
        old: LibraryRecord,
        new: LibraryRecord,
    },
    Removed(LibraryRecord),
}

impl StoreEvent {
    /// The record after the mutation (before it, for removals)
    #[must_use]
    pub const fn record(&self) -> &LibraryRecord {
        match self {
            Self::Added(record) | Self::Removed(record) => record,
            Self::Updated { new, .. } => new,
        }
    }
}

/// Callback invoked for every store mutation
pub type Observer = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Collection sizes, for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryCounts {
    pub named: Vec<(NamedKind, usize)>,
    pub platforms: usize,
    pub games: usize,
    pub filter_presets: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Collections {
    named: BTreeMap<NamedKind, BTreeMap<EntityId, NamedItem>>,
    platforms: BTreeMap<EntityId, Platform>,
    games: BTreeMap<EntityId, Game>,
    filter_presets: BTreeMap<EntityId, FilterPreset>,
}

impl Collections {
    fn named_mut(&mut self, kind: NamedKind) -> &mut BTreeMap<EntityId, NamedItem> {
        self.named.entry(kind).or_default()
    }
}

/// Thread-safe store shared across the sync pipeline.
#[derive(Clone)]
pub struct LibraryStore {
    collections: Arc<Mutex<Collections>>,
    observers: Arc<Mutex<Vec<Observer>>>,
    path: Option<PathBuf>,
}

impl LibraryStore {
    /// Open a store backed by a snapshot file. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let collections = if path.exists() {
            serde_json::from_slice(&std::fs::read(&path)?)?
        } else {
            Collections::default()
        };
        Ok(Self {
            collections: Arc::new(Mutex::new(collections)),
            observers: Arc::new(Mutex::new(Vec::new())),
            path: Some(path),
        })
    }

    /// Open an unbacked in-memory store (primarily for tests)
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self {
            collections: Arc::new(Mutex::new(Collections::default())),
            observers: Arc::new(Mutex::new(Vec::new())),
            path: None,
        }
    }

    /// Persist the current snapshot; a no-op for in-memory stores
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&*self.lock())?;
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, path)?;
        Ok(())
    }

    /// Register an observer. It runs on the mutating thread for every later
    /// mutation, after the collection lock is released.
    pub fn observe(&self, observer: Observer) {
        self.lock_observers().push(observer);
    }

    #[must_use]
    pub fn named(&self, kind: NamedKind, id: EntityId) -> Option<NamedItem> {
        self.lock()
            .named
            .get(&kind)
            .and_then(|items| items.get(&id))
            .cloned()
    }

    /// Find a named item by exact display name
    #[must_use]
    pub fn named_by_name(&self, kind: NamedKind, name: &str) -> Option<NamedItem> {
        self.lock()
            .named
            .get(&kind)
            .and_then(|items| items.values().find(|item| item.name == name))
            .cloned()
    }

    #[must_use]
    pub fn list_named(&self, kind: NamedKind) -> Vec<NamedItem> {
        self.lock()
            .named
            .get(&kind)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn add_named(&self, kind: NamedKind, item: NamedItem) {
        self.lock().named_mut(kind).insert(item.id, item.clone());
        self.emit(&StoreEvent::Added(LibraryRecord::Named(kind, item)));
    }

    pub fn update_named(&self, kind: NamedKind, item: NamedItem) -> Result<()> {
        let old = {
            let mut collections = self.lock();
            let items = collections.named_mut(kind);
            let Some(slot) = items.get_mut(&item.id) else {
                return Err(Error::NotFound(format!("{kind} {}", item.id)));
            };
            std::mem::replace(slot, item.clone())
        };
        self.emit(&StoreEvent::Updated {
            old: LibraryRecord::Named(kind, old),
            new: LibraryRecord::Named(kind, item),
        });
        Ok(())
    }

    pub fn remove_named(&self, kind: NamedKind, id: EntityId) -> Option<NamedItem> {
        let removed = self.lock().named_mut(kind).remove(&id)?;
        self.emit(&StoreEvent::Removed(LibraryRecord::Named(
            kind,
            removed.clone(),
        )));
        Some(removed)
    }

    #[must_use]
    pub fn platform(&self, id: EntityId) -> Option<Platform> {
        self.lock().platforms.get(&id).cloned()
    }

    /// Find a platform by exact display name
    #[must_use]
    pub fn platform_by_name(&self, name: &str) -> Option<Platform> {
        self.lock()
            .platforms
            .values()
            .find(|platform| platform.name == name)
            .cloned()
    }

    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        self.lock().platforms.values().cloned().collect()
    }

    pub fn add_platform(&self, platform: Platform) {
        self.lock().platforms.insert(platform.id, platform.clone());
        self.emit(&StoreEvent::Added(LibraryRecord::Platform(platform)));
    }

    pub fn update_platform(&self, platform: Platform) -> Result<()> {
        let old = {
            let mut collections = self.lock();
            let Some(slot) = collections.platforms.get_mut(&platform.id) else {
                return Err(Error::NotFound(format!("platform {}", platform.id)));
            };
            std::mem::replace(slot, platform.clone())
        };
        self.emit(&StoreEvent::Updated {
            old: LibraryRecord::Platform(old),
            new: LibraryRecord::Platform(platform),
        });
        Ok(())
    }

    pub fn remove_platform(&self, id: EntityId) -> Option<Platform> {
        let removed = self.lock().platforms.remove(&id)?;
        self.emit(&StoreEvent::Removed(LibraryRecord::Platform(
            removed.clone(),
        )));
        Some(removed)
    }

    #[must_use]
    pub fn game(&self, id: EntityId) -> Option<Game> {
        self.lock().games.get(&id).cloned()
    }

    /// Find a game by its provider identity pair
    #[must_use]
    pub fn game_by_provider(&self, game_id: Option<&str>, plugin_id: Option<Uuid>) -> Option<Game> {
        self.lock()
            .games
            .values()
            .find(|game| game.matches_provider(game_id, plugin_id))
            .cloned()
    }

    #[must_use]
    pub fn games(&self) -> Vec<Game> {
        self.lock().games.values().cloned().collect()
    }

    /// Add a game. `added` and `modified` are stamped with the current time
    /// when the caller left them empty; the stored value is returned.
    pub fn add_game(&self, mut game: Game) -> Game {
        let now = Utc::now();
        if game.added.is_none() {
            game.added = Some(now);
        }
        if game.modified.is_none() {
            game.modified = Some(now);
        }
        self.lock().games.insert(game.id, game.clone());
        self.emit(&StoreEvent::Added(LibraryRecord::Game(Box::new(
            game.clone(),
        ))));
        game
    }

    pub fn update_game(&self, game: Game) -> Result<()> {
        let old = {
            let mut collections = self.lock();
            let Some(slot) = collections.games.get_mut(&game.id) else {
                return Err(Error::NotFound(format!("game {}", game.id)));
            };
            std::mem::replace(slot, game.clone())
        };
        self.emit(&StoreEvent::Updated {
            old: LibraryRecord::Game(Box::new(old)),
            new: LibraryRecord::Game(Box::new(game)),
        });
        Ok(())
    }

    pub fn remove_game(&self, id: EntityId) -> Option<Game> {
        let removed = self.lock().games.remove(&id)?;
        self.emit(&StoreEvent::Removed(LibraryRecord::Game(Box::new(
            removed.clone(),
        ))));
        Some(removed)
    }

    #[must_use]
    pub fn filter_preset(&self, id: EntityId) -> Option<FilterPreset> {
        self.lock().filter_presets.get(&id).cloned()
    }

    /// Find a filter preset by exact display name
    #[must_use]
    pub fn filter_preset_by_name(&self, name: &str) -> Option<FilterPreset> {
        self.lock()
            .filter_presets
            .values()
            .find(|preset| preset.name == name)
            .cloned()
    }

    #[must_use]
    pub fn filter_presets(&self) -> Vec<FilterPreset> {
        self.lock().filter_presets.values().cloned().collect()
    }

    pub fn add_filter_preset(&self, preset: FilterPreset) {
        self.lock().filter_presets.insert(preset.id, preset.clone());
        self.emit(&StoreEvent::Added(LibraryRecord::FilterPreset(Box::new(
            preset,
        ))));
    }

    pub fn update_filter_preset(&self, preset: FilterPreset) -> Result<()> {
        let old = {
            let mut collections = self.lock();
            let Some(slot) = collections.filter_presets.get_mut(&preset.id) else {
                return Err(Error::NotFound(format!("filter preset {}", preset.id)));
            };
            std::mem::replace(slot, preset.clone())
        };
        self.emit(&StoreEvent::Updated {
            old: LibraryRecord::FilterPreset(Box::new(old)),
            new: LibraryRecord::FilterPreset(Box::new(preset)),
        });
        Ok(())
    }

    pub fn remove_filter_preset(&self, id: EntityId) -> Option<FilterPreset> {
        let removed = self.lock().filter_presets.remove(&id)?;
        self.emit(&StoreEvent::Removed(LibraryRecord::FilterPreset(
            Box::new(removed.clone()),
        )));
        Some(removed)
    }

    #[must_use]
    pub fn counts(&self) -> LibraryCounts {
        let collections = self.lock();
        LibraryCounts {
            named: NamedKind::ALL
                .iter()
                .map(|&kind| {
                    let len = collections.named.get(&kind).map_or(0, BTreeMap::len);
                    (kind, len)
                })
                .collect(),
            platforms: collections.platforms.len(),
            games: collections.games.len(),
            filter_presets: collections.filter_presets.len(),
        }
    }

    fn emit(&self, event: &StoreEvent) {
        let observers = self.lock_observers().clone();
        for observer in observers {
            observer(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<Observer>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl NameResolver for LibraryStore {
    fn entity_name(&self, target: ObjectType, id: EntityId) -> Option<String> {
        let base = target.base();
        if base == ObjectType::Platform {
            return self.platform(id).map(|platform| platform.name);
        }
        NamedKind::from_object_type(base)
            .and_then(|kind| self.named(kind, id))
            .map(|item| item.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recording_observer() -> (Observer, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let observer: Observer = Arc::new(move |event: &StoreEvent| {
            let label = match event {
                StoreEvent::Added(record) => format!("added {}", record.name()),
                StoreEvent::Updated { new, .. } => format!("updated {}", new.name()),
                StoreEvent::Removed(record) => format!("removed {}", record.name()),
            };
            sink.lock().unwrap().push(label);
        });
        (observer, log)
    }

    #[test]
    fn mutations_reach_observers_in_order() {
        let store = LibraryStore::open_in_memory();
        let (observer, log) = recording_observer();
        store.observe(observer);

        let mut item = NamedItem::new("Indie");
        store.add_named(NamedKind::Genre, item.clone());
        item.name = "Indies".into();
        store.update_named(NamedKind::Genre, item.clone()).unwrap();
        store.remove_named(NamedKind::Genre, item.id);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["added Indie", "updated Indies", "removed Indies"]
        );
    }

    #[test]
    fn observers_can_reenter_the_store() {
        let store = LibraryStore::open_in_memory();
        let probe = store.clone();
        let seen = Arc::new(Mutex::new(0_usize));
        let counter = Arc::clone(&seen);
        store.observe(Arc::new(move |_event| {
            *counter.lock().unwrap() += probe.list_named(NamedKind::Tag).len();
        }));

        store.add_named(NamedKind::Tag, NamedItem::new("co-op"));
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn updating_a_missing_record_is_an_error() {
        let store = LibraryStore::open_in_memory();
        let err = store
            .update_named(NamedKind::Category, NamedItem::new("Backlog"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn adding_a_game_stamps_missing_timestamps() {
        let store = LibraryStore::open_in_memory();
        let stored = store.add_game(Game::new("Baba Is You"));
        assert!(stored.added.is_some());
        assert!(stored.modified.is_some());

        let stamp = "2022-01-05T08:00:00Z".parse().unwrap();
        let mut stamped = Game::new("Braid");
        stamped.added = Some(stamp);
        let stored = store.add_game(stamped);
        assert_eq!(stored.added, Some(stamp));
    }

    #[test]
    fn games_are_found_by_provider_identity() {
        let store = LibraryStore::open_in_memory();
        let plugin = Uuid::now_v7();
        let mut game = Game::new("Dredge");
        game.game_id = Some("620".into());
        game.plugin_id = Some(plugin);
        store.add_game(game.clone());

        let found = store.game_by_provider(Some("620"), Some(plugin)).unwrap();
        assert_eq!(found.id, game.id);
        assert!(store.game_by_provider(Some("620"), None).is_none());
    }

    #[test]
    fn snapshot_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");

        let store = LibraryStore::open(&path).unwrap();
        store.add_named(NamedKind::Source, NamedItem::new("GOG"));
        store.add_platform(Platform::new("PC"));
        store.add_game(Game::new("Cyberpunk 2077"));
        store.save().unwrap();

        let reopened = LibraryStore::open(&path).unwrap();
        assert_eq!(reopened.list_named(NamedKind::Source).len(), 1);
        assert_eq!(reopened.platforms().len(), 1);
        assert_eq!(reopened.games()[0].name, "Cyberpunk 2077");
    }

    #[test]
    fn store_resolves_names_for_payload_building() {
        let store = LibraryStore::open_in_memory();
        let genre = NamedItem::new("Strategy");
        let platform = Platform::new("PC");
        store.add_named(NamedKind::Genre, genre.clone());
        store.add_platform(platform.clone());

        assert_eq!(
            store.entity_name(ObjectType::Genre, genre.id),
            Some("Strategy".into())
        );
        assert_eq!(
            store.entity_name(ObjectType::PlatformDiff, platform.id),
            Some("PC".into())
        );
        assert_eq!(store.entity_name(ObjectType::Genre, EntityId::new()), None);
    }
}
