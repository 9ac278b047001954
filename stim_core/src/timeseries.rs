//! Interval sampling of the decay model.

use crate::clock::{format_timestamp, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};
use crate::decay::current_level;
use crate::{Dose, Error, Result, TimePoint};
use std::path::Path;

pub const DEFAULT_INTERVAL_MINUTES: f64 = 15.0;

/// Point count above which a warning is logged
pub const LARGE_SERIES_POINTS: usize = 10_000;

/// Point count above which a request is rejected
pub const MAX_SERIES_POINTS: usize = 1_000_000;

const DEFAULT_WINDOW_HOURS: f64 = 24.0;

/// Sample the level curve from `start` to `end` inclusive
///
/// - `end` defaults to `now`
/// - `start` defaults to the earliest dose, or `end - 24h` without doses
///
/// Every point is computed against the full dose set, so doses before the
/// window still contribute as they decay into it. An `end` before `start`
/// yields no points.
pub fn generate(
    doses: &[Dose],
    start: Option<f64>,
    end: Option<f64>,
    interval_minutes: f64,
    now: f64,
) -> Result<Vec<TimePoint>> {
    if !interval_minutes.is_finite() || interval_minutes <= 0.0 {
        return Err(Error::InvalidNumericInput(format!(
            "interval must be a positive number of minutes, got {}",
            interval_minutes
        )));
    }

    let end = end.unwrap_or(now);
    let start = start.unwrap_or_else(|| {
        doses
            .iter()
            .map(|d| d.timestamp)
            .min_by(f64::total_cmp)
            .unwrap_or(end - DEFAULT_WINDOW_HOURS * SECONDS_PER_HOUR)
    });

    if !start.is_finite() || !end.is_finite() {
        return Err(Error::InvalidNumericInput(
            "time series window must be finite".into(),
        ));
    }
    if end < start {
        return Ok(Vec::new());
    }

    let interval_seconds = interval_minutes * SECONDS_PER_MINUTE;
    let steps = ((end - start) / interval_seconds).floor();
    if !steps.is_finite() || steps >= MAX_SERIES_POINTS as f64 {
        return Err(Error::InvalidNumericInput(format!(
            "interval of {} minutes yields more than {} points",
            interval_minutes, MAX_SERIES_POINTS
        )));
    }
    let num_points = steps as usize + 1;

    if num_points > LARGE_SERIES_POINTS {
        tracing::warn!("Large time range ({} points)", num_points);
    }

    let points = (0..num_points)
        .map(|i| {
            let timestamp = start + i as f64 * interval_seconds;
            TimePoint {
                timestamp,
                datetime: format_timestamp(timestamp),
                level: current_level(doses, timestamp),
            }
        })
        .collect();

    Ok(points)
}

/// Write a time-series snapshot as pretty JSON
pub fn write_snapshot(path: &Path, points: &[TimePoint]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(points)?)?;
    tracing::debug!("Wrote {} time points to {:?}", points.len(), path);
    Ok(())
}
