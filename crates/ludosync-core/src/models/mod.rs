//! Data models for ludosync

mod change;
mod diff;
mod dto;
mod entity;
mod filter;
mod game;
mod object_type;

pub use change::{ChangeEnvelope, GameChangeRequest, GameKey};
pub use diff::{field, GameDiffDto, PlatformDiffDto};
pub use dto::{AttachmentKind, FilterPresetDto, GameDto, NamedItemDto, NamedRef, PlatformDto};
pub use entity::{EntityId, NamedItem, NamedKind, Platform};
pub use filter::{FilterPreset, FilterPresetSettings, IdFilter, IntFilter, StringFilter};
pub use game::{Game, Link};
pub use object_type::ObjectType;
