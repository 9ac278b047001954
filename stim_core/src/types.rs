//! Core domain types for stim.
//!
//! - Doses and the persisted store layout
//! - Derived records (cache entry, time points, history rows)

use crate::clock::format_timestamp;
use serde::{Deserialize, Serialize};

// ============================================================================
// Dose Types
// ============================================================================

/// A single caffeine intake event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dose {
    pub id: u64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Milligrams
    pub amount: f64,
    /// Local-time rendering of `timestamp`, kept for human readers of the file
    pub datetime: String,
}

impl Dose {
    pub fn new(id: u64, timestamp: f64, amount: f64) -> Self {
        Self {
            id,
            timestamp,
            amount,
            datetime: format_timestamp(timestamp),
        }
    }
}

/// Persisted dose log with its undo stack
///
/// `doses` is in insertion order, which is not necessarily timestamp order.
/// `undone` is a LIFO stack fed by [`StoreData::undo`] and drained by
/// [`StoreData::redo`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoreData {
    pub doses: Vec<Dose>,
    #[serde(rename = "undone_doses", default)]
    pub undone: Vec<Dose>,
    pub next_id: u64,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            doses: Vec::new(),
            undone: Vec::new(),
            next_id: 1,
        }
    }
}

impl StoreData {
    /// Append a new dose under a freshly issued id
    pub fn push_new(&mut self, timestamp: f64, amount: f64) -> Dose {
        let dose = Dose::new(self.next_id, timestamp, amount);
        self.next_id += 1;
        self.doses.push(dose.clone());
        dose
    }

    /// Move the most recently inserted dose onto the undo stack
    ///
    /// With `limit` set, the oldest undone entries beyond it are dropped.
    pub fn undo(&mut self, limit: Option<usize>) -> Option<Dose> {
        let dose = self.doses.pop()?;
        self.undone.push(dose.clone());
        if let Some(limit) = limit {
            let excess = self.undone.len().saturating_sub(limit);
            self.undone.drain(..excess);
        }
        Some(dose)
    }

    /// Move the most recently undone dose back to the end of the log
    pub fn redo(&mut self) -> Option<Dose> {
        let dose = self.undone.pop()?;
        self.doses.push(dose.clone());
        Some(dose)
    }

    /// Smallest id guaranteed unused by anything in the log or on the stack
    pub(crate) fn min_next_id(&self) -> u64 {
        self.doses
            .iter()
            .chain(self.undone.iter())
            .map(|d| d.id + 1)
            .max()
            .unwrap_or(1)
    }
}

// ============================================================================
// Derived Records
// ============================================================================

/// Last computed current level
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub timestamp: f64,
    pub level: f64,
    pub datetime: String,
}

/// One sample of the level curve
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimePoint {
    pub timestamp: f64,
    pub datetime: String,
    pub level: f64,
}

/// A dose annotated with its state at query time
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub id: u64,
    pub timestamp: f64,
    pub datetime: String,
    pub amount: f64,
    pub hours_ago: f64,
    pub remaining: f64,
}
