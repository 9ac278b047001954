//! Time source and timestamp helpers.
//!
//! Timestamps are `f64` seconds since the Unix epoch, the unit every
//! persisted record uses.

use chrono::{DateTime, Local, Utc};
use std::cell::Cell;
use std::rc::Rc;

pub const SECONDS_PER_MINUTE: f64 = 60.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Human-readable form stored next to every timestamp
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Source of "now" for the store and generators
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        to_epoch_seconds(&Utc::now())
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn advance_hours(&self, hours: f64) {
        self.now.set(self.now.get() + hours * SECONDS_PER_HOUR);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

pub fn to_epoch_seconds<Tz: chrono::TimeZone>(dt: &DateTime<Tz>) -> f64 {
    dt.timestamp_micros() as f64 / 1_000_000.0
}

/// Convert epoch seconds to UTC, saturating at the epoch for unrepresentable values
pub fn from_epoch_seconds(ts: f64) -> DateTime<Utc> {
    let micros = (ts * 1_000_000.0).round() as i64;
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(micros.div_euclid(1_000_000), nanos).unwrap_or_default()
}

pub fn to_local(ts: f64) -> DateTime<Local> {
    from_epoch_seconds(ts).with_timezone(&Local)
}

/// Format a timestamp as local `dd/mm/YYYY HH:MM:SS`
pub fn format_timestamp(ts: f64) -> String {
    to_local(ts).format(DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_epoch_roundtrip_keeps_microseconds() {
        let ts = 1_700_000_000.123_456;
        let back = to_epoch_seconds(&from_epoch_seconds(ts));
        assert!((back - ts).abs() < 1e-5);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1000.0);
        let handle = clock.clone();
        handle.advance_hours(2.0);
        assert_eq!(clock.now(), 1000.0 + 7200.0);
    }

    #[test]
    fn test_to_epoch_seconds() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(to_epoch_seconds(&dt), 1_704_067_200.0);
    }
}
