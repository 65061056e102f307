//! Echo suppression for locally applied remote changes
//!
//! Every store write made on behalf of a remote change is announced here
//! first, keyed by the entity's base object type and id. The outbound
//! observer consults the registry at observe time; a hit swallows the event
//! so an applied change never echoes back to the server. Entries expire
//! after a short window and are consumed as they are read.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::models::{EntityId, ObjectType};

const GRACE_WINDOW: Duration = Duration::from_millis(500);

/// Registry of entities whose next observed mutation is self-inflicted
#[derive(Clone)]
pub struct GraceRegistry {
    entries: Arc<Mutex<HashMap<(ObjectType, EntityId), Instant>>>,
    window: Duration,
}

impl Default for GraceRegistry {
    fn default() -> Self {
        Self::with_window(GRACE_WINDOW)
    }
}

impl GraceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            window,
        }
    }

    /// Announce an imminent local write on behalf of a remote change
    pub fn suppress(&self, target: ObjectType, id: EntityId) {
        let expiry = Instant::now() + self.window;
        self.lock().insert((target.base(), id), expiry);
    }

    /// Whether the entity is inside its grace window. A hit consumes the
    /// entry; expired entries are swept on the way through.
    #[must_use]
    pub fn is_suppressed(&self, target: ObjectType, id: EntityId) -> bool {
        let key = (target.base(), id);
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, expiry| *expiry > now);
        entries.remove(&key).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(ObjectType, EntityId), Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_grace_entry_is_consumed_by_its_first_read() {
        let grace = GraceRegistry::new();
        let id = EntityId::new();
        grace.suppress(ObjectType::Category, id);

        assert!(grace.is_suppressed(ObjectType::Category, id));
        assert!(!grace.is_suppressed(ObjectType::Category, id));
    }

    #[test]
    fn diff_types_share_their_base_entry() {
        let grace = GraceRegistry::new();
        let id = EntityId::new();
        grace.suppress(ObjectType::GameDiff, id);
        assert!(grace.is_suppressed(ObjectType::Game, id));
    }

    #[test]
    fn expired_entries_do_not_suppress() {
        let grace = GraceRegistry::with_window(Duration::ZERO);
        let id = EntityId::new();
        grace.suppress(ObjectType::Tag, id);
        assert!(!grace.is_suppressed(ObjectType::Tag, id));
    }

    #[test]
    fn unrelated_entities_are_not_suppressed() {
        let grace = GraceRegistry::new();
        grace.suppress(ObjectType::Tag, EntityId::new());
        assert!(!grace.is_suppressed(ObjectType::Tag, EntityId::new()));
    }
}
