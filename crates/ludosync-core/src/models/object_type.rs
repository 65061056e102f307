//! Object taxonomy shared by change envelopes, grace tracking and transport

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of synchronizable object kinds.
///
/// The two `*Diff` variants denote an incremental representation of their
/// base kind, not a distinct kind; identity and grace-period scoping always
/// go through [`ObjectType::base`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Category,
    Genre,
    Platform,
    PlatformDiff,
    Company,
    Feature,
    Tag,
    Series,
    AgeRating,
    Region,
    Source,
    CompletionStatus,
    FilterPreset,
    Game,
    GameDiff,
}

impl ObjectType {
    /// Map a diff type to the base type it patches; other types map to
    /// themselves.
    #[must_use]
    pub const fn base(self) -> Self {
        match self {
            Self::PlatformDiff => Self::Platform,
            Self::GameDiff => Self::Game,
            other => other,
        }
    }

    /// Path segment used by the object endpoints (`/api/{path}/...`).
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Genre => "genre",
            Self::Platform => "platform",
            Self::PlatformDiff => "platform-diff",
            Self::Company => "company",
            Self::Feature => "feature",
            Self::Tag => "tag",
            Self::Series => "series",
            Self::AgeRating => "age-rating",
            Self::Region => "region",
            Self::Source => "source",
            Self::CompletionStatus => "completion-status",
            Self::FilterPreset => "filter-preset",
            Self::Game => "game",
            Self::GameDiff => "game-diff",
        }
    }

    /// Path segment of the attachment endpoints, for the kinds that own
    /// binary attachments.
    #[must_use]
    pub const fn metadata_path(self) -> Option<&'static str> {
        match self.base() {
            Self::Platform => Some("platform-metadata"),
            Self::Game => Some("game-metadata"),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
