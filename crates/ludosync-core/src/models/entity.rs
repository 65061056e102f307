//! Core library entities: identities, plain named items and platforms

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::dto::AttachmentKind;
use super::object_type::ObjectType;

/// A unique identifier for a library entity, using UUID v7 (time-sortable)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new unique entity ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The kinds stored as plain named items, sharing one collection shape and
/// one sync strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NamedKind {
    Category,
    Genre,
    Company,
    Feature,
    Tag,
    Series,
    AgeRating,
    Region,
    Source,
    CompletionStatus,
}

impl NamedKind {
    /// Every named kind, in the order bulk pushes walk the collections.
    pub const ALL: [Self; 10] = [
        Self::Category,
        Self::Genre,
        Self::Company,
        Self::Feature,
        Self::Tag,
        Self::Series,
        Self::AgeRating,
        Self::Region,
        Self::Source,
        Self::CompletionStatus,
    ];

    #[must_use]
    pub const fn object_type(self) -> ObjectType {
        match self {
            Self::Category => ObjectType::Category,
            Self::Genre => ObjectType::Genre,
            Self::Company => ObjectType::Company,
            Self::Feature => ObjectType::Feature,
            Self::Tag => ObjectType::Tag,
            Self::Series => ObjectType::Series,
            Self::AgeRating => ObjectType::AgeRating,
            Self::Region => ObjectType::Region,
            Self::Source => ObjectType::Source,
            Self::CompletionStatus => ObjectType::CompletionStatus,
        }
    }

    /// The named kind behind an object type, if it is one of the plain kinds.
    #[must_use]
    pub const fn from_object_type(object_type: ObjectType) -> Option<Self> {
        match object_type {
            ObjectType::Category => Some(Self::Category),
            ObjectType::Genre => Some(Self::Genre),
            ObjectType::Company => Some(Self::Company),
            ObjectType::Feature => Some(Self::Feature),
            ObjectType::Tag => Some(Self::Tag),
            ObjectType::Series => Some(Self::Series),
            ObjectType::AgeRating => Some(Self::AgeRating),
            ObjectType::Region => Some(Self::Region),
            ObjectType::Source => Some(Self::Source),
            ObjectType::CompletionStatus => Some(Self::CompletionStatus),
            _ => None,
        }
    }
}

impl fmt::Display for NamedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.object_type().fmt(f)
    }
}

/// A plain named library item (category, genre, company, tag, ...).
///
/// `specification_id` is only ever populated for regions; the other kinds
/// leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedItem {
    pub id: EntityId,
    pub name: String,
    pub specification_id: Option<String>,
}

impl NamedItem {
    /// Create a new item with a fresh identity
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            specification_id: None,
        }
    }
}

/// A gaming platform, with optional binary attachments referenced by local
/// storage handles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: EntityId,
    pub name: String,
    pub specification_id: Option<String>,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub background_image: Option<String>,
}

impl Platform {
    /// Create a new platform with a fresh identity
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Self::default()
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
}
