//! "What if" planning for a dose that has not been taken.
//!
//! Evaluates a hypothetical dose against the current log at fixed clock
//! times (evening, night, next morning). Nothing is persisted.

use crate::clock::{to_epoch_seconds, SECONDS_PER_MINUTE};
use crate::decay::current_level;
use crate::Dose;
use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};

/// Clock times the planner reports on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceTime {
    Evening,
    Night,
    Morning,
}

impl ReferenceTime {
    pub const ALL: [ReferenceTime; 3] = [
        ReferenceTime::Evening,
        ReferenceTime::Night,
        ReferenceTime::Morning,
    ];

    /// (hour, minute) in local time
    pub fn clock_time(self) -> (u32, u32) {
        match self {
            ReferenceTime::Evening => (18, 0),
            ReferenceTime::Night => (22, 0),
            ReferenceTime::Morning => (8, 0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReferenceTime::Evening => "6 PM",
            ReferenceTime::Night => "10 PM",
            ReferenceTime::Morning => "8 AM",
        }
    }
}

/// Projected level at one reference time
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub reference: ReferenceTime,
    pub timestamp: f64,
    pub level: f64,
}

/// Result of evaluating a hypothetical dose
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub amount: f64,
    /// When the hypothetical dose would be taken
    pub dose_timestamp: f64,
    /// Level now, without the hypothetical dose
    pub current_level: f64,
    /// Level now, with the hypothetical dose
    pub with_dose_level: f64,
    /// With-dose levels, in [`ReferenceTime::ALL`] order
    pub checkpoints: Vec<Checkpoint>,
}

impl Projection {
    pub fn checkpoint(&self, reference: ReferenceTime) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.reference == reference)
    }
}

/// Timestamp rule shared with `DoseStore::add`
///
/// The offset always moves the dose into the past, whatever its sign, and
/// the result never lies after `now`.
pub fn dose_timestamp(now: f64, offset_minutes: f64) -> f64 {
    let timestamp = now - (offset_minutes * SECONDS_PER_MINUTE).abs();
    timestamp.min(now)
}

/// Next occurrence of `hour:minute` strictly after `now`, in `now`'s timezone
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    let today_target = at_clock_time(&tz, today, hour, minute);
    if let Some(target) = today_target.filter(|t| t > now) {
        return target;
    }

    today
        .checked_add_days(Days::new(1))
        .and_then(|tomorrow| at_clock_time(&tz, tomorrow, hour, minute))
        .unwrap_or_else(|| now.clone() + Duration::days(1))
}

fn at_clock_time<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    first_valid_local(naive, |n| tz.from_local_datetime(n))
}

const GAP_STEP_MINUTES: i64 = 15;
const MAX_GAP_STEPS: i64 = 16;

/// Earliest instant for `naive`
///
/// A wall time skipped by a DST jump resolves to the first valid time after
/// the gap.
fn first_valid_local<T>(
    naive: NaiveDateTime,
    lookup: impl Fn(&NaiveDateTime) -> LocalResult<T>,
) -> Option<T> {
    (0..=MAX_GAP_STEPS).find_map(|step| {
        naive
            .checked_add_signed(Duration::minutes(step * GAP_STEP_MINUTES))
            .and_then(|candidate| lookup(&candidate).earliest())
    })
}

/// Evaluate `amount` taken `offset_minutes` ago against `doses`
pub fn project<Tz: TimeZone>(
    doses: &[Dose],
    amount: f64,
    offset_minutes: f64,
    now: &DateTime<Tz>,
) -> Projection {
    let now_ts = to_epoch_seconds(now);
    let dose_ts = dose_timestamp(now_ts, offset_minutes);

    let mut with_dose = doses.to_vec();
    with_dose.push(Dose {
        id: 0,
        timestamp: dose_ts,
        amount,
        datetime: String::new(),
    });

    let checkpoints = ReferenceTime::ALL
        .iter()
        .map(|&reference| {
            let (hour, minute) = reference.clock_time();
            let timestamp = to_epoch_seconds(&next_occurrence(now, hour, minute));
            Checkpoint {
                reference,
                timestamp,
                level: current_level(&with_dose, timestamp),
            }
        })
        .collect();

    Projection {
        amount,
        dose_timestamp: dose_ts,
        current_level: current_level(doses, now_ts),
        with_dose_level: current_level(&with_dose, now_ts),
        checkpoints,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SECONDS_PER_HOUR;
    use chrono::{Datelike, FixedOffset, Timelike, Utc};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_dose_timestamp_offsets_always_in_past() {
        let now = 10_000.0;
        assert_eq!(dose_timestamp(now, 0.0), now);
        assert_eq!(dose_timestamp(now, 30.0), now - 1800.0);
        assert_eq!(dose_timestamp(now, -30.0), now - 1800.0);
    }

    #[test]
    fn test_next_occurrence_later_today() {
        let next = next_occurrence(&noon(), 18, 0);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_already_passed_rolls_to_tomorrow() {
        let next = next_occurrence(&noon(), 8, 0);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_exactly_now_rolls_to_tomorrow() {
        let six_pm = Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap();
        let next = next_occurrence(&six_pm, 18, 0);
        assert_eq!(next.day(), 11);
        assert_eq!(next.hour(), 18);
    }

    #[test]
    fn test_clock_time_in_dst_gap_resolves_after_gap() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let gap_start = date.and_hms_opt(2, 0, 0).unwrap();
        let gap_end = date.and_hms_opt(3, 0, 0).unwrap();
        let lookup = |n: &NaiveDateTime| {
            if *n >= gap_start && *n < gap_end {
                LocalResult::None
            } else {
                offset.from_local_datetime(n)
            }
        };

        let resolved = first_valid_local(date.and_hms_opt(2, 30, 0).unwrap(), lookup).unwrap();
        assert_eq!(resolved.naive_local(), gap_end);

        let regular = first_valid_local(date.and_hms_opt(18, 0, 0).unwrap(), lookup).unwrap();
        assert_eq!(regular.naive_local(), date.and_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn test_project_with_empty_log() {
        let now = noon();
        let projection = project(&[], 100.0, 0.0, &now);

        assert_eq!(projection.current_level, 0.0);
        assert_eq!(projection.with_dose_level, 100.0);
        assert_eq!(projection.dose_timestamp, to_epoch_seconds(&now));

        // 18:00 is 6h out, 22:00 is 10h out, 08:00 tomorrow is 20h out
        let evening = projection.checkpoint(ReferenceTime::Evening).unwrap();
        assert_eq!(evening.level, 50.0);
        let night = projection.checkpoint(ReferenceTime::Night).unwrap();
        assert_eq!(night.level, 31.5);
        let morning = projection.checkpoint(ReferenceTime::Morning).unwrap();
        assert_eq!(morning.level, 9.92);
    }

    #[test]
    fn test_project_includes_existing_doses() {
        let now = noon();
        let now_ts = to_epoch_seconds(&now);
        let doses = vec![Dose::new(1, now_ts - 6.0 * SECONDS_PER_HOUR, 100.0)];

        let projection = project(&doses, 100.0, 0.0, &now);
        assert_eq!(projection.current_level, 50.0);
        assert_eq!(projection.with_dose_level, 150.0);
        let evening = projection.checkpoint(ReferenceTime::Evening).unwrap();
        assert_eq!(evening.level, 75.0);
    }

    #[test]
    fn test_checkpoints_in_fixed_order() {
        let projection = project(&[], 50.0, 0.0, &noon());
        let order: Vec<ReferenceTime> =
            projection.checkpoints.iter().map(|c| c.reference).collect();
        assert_eq!(order, ReferenceTime::ALL.to_vec());
    }
}
