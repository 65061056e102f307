//! Attachment file storage
//!
//! Binary attachments live as plain files under a media directory, addressed
//! by handles of the form `{owner}/{uuid}{ext}`. Handles are stable strings
//! stored on the owning entity; the bytes never enter the library snapshot.

use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::models::EntityId;
use crate::{Error, Result};

/// Directory-backed store for entity attachments
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a file store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Copy `source` into the store under a fresh handle owned by `owner`.
    /// The source's extension carries over into the handle.
    pub fn add(&self, owner: EntityId, source: &Path) -> Result<String> {
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let handle = format!("{owner}/{}{extension}", Uuid::now_v7());
        let target = self.locate(&handle)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, &target)?;
        Ok(handle)
    }

    /// Absolute path behind a handle, if the file exists
    #[must_use]
    pub fn resolve(&self, handle: &str) -> Option<PathBuf> {
        let path = self.locate(handle).ok()?;
        path.is_file().then_some(path)
    }

    /// Read the bytes behind a handle
    pub fn read(&self, handle: &str) -> Result<Vec<u8>> {
        let path = self
            .resolve(handle)
            .ok_or_else(|| Error::Attachment(format!("no file behind handle {handle}")))?;
        Ok(std::fs::read(path)?)
    }

    /// Delete the file behind a handle; an already missing file is fine
    pub fn remove(&self, handle: &str) -> Result<()> {
        let path = self.locate(handle)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
        if let Some(parent) = path.parent() {
            if parent != self.root {
                // drops the owner directory once its last attachment is gone
                let _ = std::fs::remove_dir(parent);
            }
        }
        Ok(())
    }

    // Handles are relative paths; reject anything that could leave the root.
    fn locate(&self, handle: &str) -> Result<PathBuf> {
        let relative = Path::new(handle);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|part| matches!(part, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(Error::Attachment(format!(
                "invalid attachment handle {handle}"
            )));
        }
        Ok(self.root.join(relative))
    }
}
