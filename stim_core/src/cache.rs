//! Current-level cache.
//!
//! The cache is a side channel for other consumers of the data directory:
//! every read recomputes the level and rewrites the entry, and every store
//! mutation deletes it. Nothing inside stim trusts a stored entry.

use crate::{CacheEntry, Result};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Sink for the most recently computed level
pub trait LevelCache {
    fn write(&mut self, entry: &CacheEntry) -> Result<()>;
    fn invalidate(&mut self) -> Result<()>;
}

/// JSON file cache
pub struct JsonCacheFile {
    path: PathBuf,
}

impl JsonCacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LevelCache for JsonCacheFile {
    fn write(&mut self, entry: &CacheEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entry)?;
        std::fs::write(&self.path, contents)?;
        tracing::debug!("Cached level {}mg at {:?}", entry.level, self.path);
        Ok(())
    }

    fn invalidate(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Invalidated cache {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory cache. Clones share the same entry.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entry: Rc<RefCell<Option<CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> Option<CacheEntry> {
        self.entry.borrow().clone()
    }
}

impl LevelCache for MemoryCache {
    fn write(&mut self, entry: &CacheEntry) -> Result<()> {
        *self.entry.borrow_mut() = Some(entry.clone());
        Ok(())
    }

    fn invalidate(&mut self) -> Result<()> {
        self.entry.borrow_mut().take();
        Ok(())
    }
}
