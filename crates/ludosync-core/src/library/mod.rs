//! Library state: collections, change events and attachment files

mod files;
mod store;

pub use files::FileStore;
pub use store::{LibraryCounts, LibraryRecord, LibraryStore, Observer, StoreEvent};
