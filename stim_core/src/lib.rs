#![forbid(unsafe_code)]

//! Core domain model and business logic for the stim caffeine tracker.
//!
//! This crate provides:
//! - Half-life decay model
//! - Dose store with undo/redo (JSON file or in-memory storage)
//! - Time-series sampling and projection of hypothetical doses
//! - Current-level cache, configuration, logging

pub mod types;
pub mod error;
pub mod clock;
pub mod config;
pub mod logging;
pub mod decay;
pub mod storage;
pub mod cache;
pub mod timeseries;
pub mod projection;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use clock::{Clock, ManualClock, SystemClock};
pub use decay::{current_level, remaining_after, HALF_LIFE_HOURS};
pub use projection::{Projection, ReferenceTime};
pub use store::{DataPaths, DoseStore};
