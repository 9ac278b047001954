//! Dose store persistence.
//!
//! The store file is read under a shared lock and replaced atomically:
//! the new contents go to a locked temp file in the same directory, are
//! synced, then renamed over the original. The read-modify-write cycle
//! as a whole is not locked; concurrent processes are last-writer-wins.

use crate::clock::format_timestamp;
use crate::{Dose, Error, Result, StoreData};
use fs2::FileExt;
use serde::Deserialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::NamedTempFile;

/// Backing store for [`StoreData`]
pub trait Storage {
    fn load(&self) -> Result<StoreData>;
    fn save(&mut self, data: &StoreData) -> Result<()>;
}

/// JSON file storage with file locking
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn malformed(&self, reason: impl ToString) -> Error {
        Error::MalformedStore {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Storage for JsonFileStorage {
    /// Returns an empty store if the file doesn't exist.
    /// A file that exists but cannot be decoded is an error; it is never
    /// replaced with an empty store.
    fn load(&self) -> Result<StoreData> {
        if !self.path.exists() {
            tracing::debug!("No store file at {:?}, starting empty", self.path);
            return Ok(StoreData::default());
        }

        let file = File::open(&self.path)?;

        // Acquire shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read.map_err(|e| self.malformed(e))?;

        let raw: RawStoreData = serde_json::from_str(&contents).map_err(|e| self.malformed(e))?;
        let data = raw.normalize();
        tracing::debug!(
            "Loaded {} doses ({} undone) from {:?}",
            data.doses.len(),
            data.undone.len(),
            self.path
        );
        Ok(data)
    }

    fn save(&mut self, data: &StoreData) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        // Create unique temp file in the same directory for atomic rename
        let temp = NamedTempFile::new_in(parent)?;

        // Acquire exclusive lock on the temp file to serialize concurrent writers
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, data)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        // Atomically replace old store file
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} doses to {:?}", data.doses.len(), self.path);
        Ok(())
    }
}

/// In-memory storage. Clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    data: Rc<RefCell<StoreData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StoreData {
        self.data.borrow().clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<StoreData> {
        Ok(self.snapshot())
    }

    fn save(&mut self, data: &StoreData) -> Result<()> {
        *self.data.borrow_mut() = data.clone();
        Ok(())
    }
}

// ============================================================================
// On-disk layout, including files written before ids and undo existed
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawDose {
    #[serde(default)]
    id: Option<u64>,
    timestamp: f64,
    amount: f64,
    #[serde(default)]
    datetime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStoreData {
    #[serde(default)]
    doses: Vec<RawDose>,
    #[serde(default)]
    undone_doses: Vec<RawDose>,
    #[serde(default)]
    next_id: Option<u64>,
}

impl RawStoreData {
    fn normalize(self) -> StoreData {
        let mut data = StoreData {
            doses: Vec::with_capacity(self.doses.len()),
            undone: Vec::with_capacity(self.undone_doses.len()),
            next_id: self.next_id.unwrap_or(1),
        };

        let known_max = self
            .doses
            .iter()
            .chain(self.undone_doses.iter())
            .filter_map(|d| d.id)
            .max()
            .unwrap_or(0);
        let mut next_free = data.next_id.max(known_max + 1);
        let mut assigned = 0usize;

        let mut convert = |raw: RawDose| {
            let id = raw.id.unwrap_or_else(|| {
                assigned += 1;
                let id = next_free;
                next_free += 1;
                id
            });
            Dose {
                id,
                timestamp: raw.timestamp,
                amount: raw.amount,
                datetime: raw
                    .datetime
                    .unwrap_or_else(|| format_timestamp(raw.timestamp)),
            }
        };

        data.doses = self.doses.into_iter().map(&mut convert).collect();
        data.undone = self.undone_doses.into_iter().map(&mut convert).collect();

        if assigned > 0 {
            tracing::warn!("Assigned ids to {} doses from a legacy store file", assigned);
        }

        data.next_id = data.next_id.max(data.min_next_id());
        data
    }
}
