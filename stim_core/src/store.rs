//! Dose event store.
//!
//! Every operation loads the store, applies its change, and (for mutations)
//! writes the whole store back and invalidates the level cache before
//! returning.

use crate::cache::{JsonCacheFile, LevelCache};
use crate::clock::{format_timestamp, to_local, Clock, SystemClock, SECONDS_PER_HOUR};
use crate::config::LimitsConfig;
use crate::decay::{current_level, remaining_after, round1, round2, HALF_LIFE_HOURS};
use crate::projection::{dose_timestamp, project, Projection};
use crate::storage::{JsonFileStorage, Storage};
use crate::timeseries;
use crate::{CacheEntry, Config, Dose, Error, HistoryEntry, Result, StoreData, TimePoint};
use std::path::{Path, PathBuf};

/// Doses older than this many half-lives are dropped by [`DoseStore::prune`]
pub const PRUNE_AFTER_HALF_LIVES: f64 = 10.0;

/// Locations of the files in a data directory
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub data_file: PathBuf,
    pub cache_file: PathBuf,
    pub timeseries_file: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_file: data_dir.join("caffeine_data.json"),
            cache_file: data_dir.join("caffeine_cache.json"),
            timeseries_file: data_dir.join("caffeine_timeseries.json"),
        }
    }
}

pub struct DoseStore {
    storage: Box<dyn Storage>,
    cache: Box<dyn LevelCache>,
    clock: Box<dyn Clock>,
    limits: LimitsConfig,
}

impl DoseStore {
    pub fn new(
        storage: Box<dyn Storage>,
        cache: Box<dyn LevelCache>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            cache,
            clock,
            limits: LimitsConfig::default(),
        }
    }

    /// File-backed store on the wall clock
    pub fn open(paths: &DataPaths, config: &Config) -> Self {
        Self::new(
            Box::new(JsonFileStorage::new(&paths.data_file)),
            Box::new(JsonCacheFile::new(&paths.cache_file)),
            Box::new(SystemClock),
        )
        .with_limits(config.limits.clone())
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Current persisted state
    pub fn data(&self) -> Result<StoreData> {
        self.storage.load()
    }

    pub fn doses(&self) -> Result<Vec<Dose>> {
        Ok(self.storage.load()?.doses)
    }

    fn validate_amount(&self, amount: f64) -> Result<()> {
        let max = self.limits.max_dose_mg;
        // NaN fails the first comparison
        if !(amount > 0.0) || amount > max {
            return Err(Error::InvalidAmount { amount, max });
        }
        Ok(())
    }

    fn persist(&mut self, data: &StoreData) -> Result<()> {
        self.storage.save(data)?;
        self.cache.invalidate()
    }

    /// Record a dose taken `offset_minutes` ago and return the new level
    ///
    /// The offset is applied as an absolute value: both signs place the dose
    /// in the past.
    pub fn add(&mut self, amount: f64, offset_minutes: f64) -> Result<f64> {
        self.validate_amount(amount)?;
        if !offset_minutes.is_finite() {
            return Err(Error::InvalidNumericInput(format!(
                "time offset must be finite, got {}",
                offset_minutes
            )));
        }

        let mut data = self.storage.load()?;
        let now = self.clock.now();
        let dose = data.push_new(dose_timestamp(now, offset_minutes), amount);
        self.persist(&data)?;

        tracing::info!("Added dose {} ({}mg at {})", dose.id, dose.amount, dose.datetime);
        Ok(current_level(&data.doses, now))
    }

    /// Remove the most recently added dose; `None` when there is nothing to undo
    pub fn undo(&mut self) -> Result<Option<Dose>> {
        let mut data = self.storage.load()?;
        let Some(dose) = data.undo(self.limits.undo_limit) else {
            tracing::debug!("Nothing to undo");
            return Ok(None);
        };
        self.persist(&data)?;

        tracing::info!("Undid dose {} ({}mg)", dose.id, dose.amount);
        Ok(Some(dose))
    }

    /// Restore the most recently undone dose; `None` when there is nothing to redo
    pub fn redo(&mut self) -> Result<Option<Dose>> {
        let mut data = self.storage.load()?;
        let Some(dose) = data.redo() else {
            tracing::debug!("Nothing to redo");
            return Ok(None);
        };
        self.persist(&data)?;

        tracing::info!("Redid dose {} ({}mg)", dose.id, dose.amount);
        Ok(Some(dose))
    }

    /// The `limit` latest doses by timestamp, oldest first
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut doses = self.storage.load()?.doses;
        doses.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let skip = doses.len().saturating_sub(limit);
        let now = self.clock.now();

        Ok(doses
            .into_iter()
            .skip(skip)
            .map(|dose| HistoryEntry {
                hours_ago: round1((now - dose.timestamp) / SECONDS_PER_HOUR),
                remaining: round2(remaining_after(&dose, now)),
                id: dose.id,
                timestamp: dose.timestamp,
                datetime: dose.datetime,
                amount: dose.amount,
            })
            .collect())
    }

    /// The `limit` latest doses in insertion order
    pub fn recent(&self, limit: usize) -> Result<Vec<Dose>> {
        let doses = self.storage.load()?.doses;
        let skip = doses.len().saturating_sub(limit);
        Ok(doses.into_iter().skip(skip).collect())
    }

    /// Drop doses that have fully decayed; returns how many were removed
    pub fn prune(&mut self) -> Result<usize> {
        let mut data = self.storage.load()?;
        let now = self.clock.now();
        let cutoff_hours = HALF_LIFE_HOURS * PRUNE_AFTER_HALF_LIVES;

        let before = data.doses.len();
        data.doses
            .retain(|dose| (now - dose.timestamp) / SECONDS_PER_HOUR < cutoff_hours);
        let removed = before - data.doses.len();

        self.persist(&data)?;
        tracing::info!("Pruned {} fully decayed doses", removed);
        Ok(removed)
    }

    /// Level at an arbitrary instant
    pub fn level_at(&self, at: f64) -> Result<f64> {
        Ok(current_level(&self.storage.load()?.doses, at))
    }

    /// Current level, always freshly computed
    ///
    /// The result is written to the level cache before it is returned.
    pub fn current(&mut self) -> Result<CacheEntry> {
        let doses = self.storage.load()?.doses;
        let now = self.clock.now();
        let entry = CacheEntry {
            timestamp: now,
            level: current_level(&doses, now),
            datetime: format_timestamp(now),
        };
        self.cache.write(&entry)?;
        Ok(entry)
    }

    /// Sample the level curve; see [`timeseries::generate`]
    pub fn timeseries(
        &self,
        start: Option<f64>,
        end: Option<f64>,
        interval_minutes: f64,
    ) -> Result<Vec<TimePoint>> {
        let doses = self.storage.load()?.doses;
        timeseries::generate(&doses, start, end, interval_minutes, self.clock.now())
    }

    /// Evaluate a dose without recording it
    pub fn check_future_dose(&self, amount: f64, offset_minutes: f64) -> Result<Projection> {
        self.validate_amount(amount)?;
        let doses = self.storage.load()?.doses;
        Ok(project(&doses, amount, offset_minutes, &to_local(self.clock.now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;

    const T0: f64 = 1_700_000_000.0;

    struct Harness {
        store: DoseStore,
        storage: MemoryStorage,
        cache: MemoryCache,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        crate::logging::init_test();
        let storage = MemoryStorage::new();
        let cache = MemoryCache::new();
        let clock = ManualClock::new(T0);
        let store = DoseStore::new(
            Box::new(storage.clone()),
            Box::new(cache.clone()),
            Box::new(clock.clone()),
        );
        Harness {
            store,
            storage,
            cache,
            clock,
        }
    }

    #[test]
    fn test_add_then_decay_over_time() {
        let mut h = harness();

        let level = h.store.add(100.0, 0.0).unwrap();
        assert_eq!(level, 100.0);

        h.clock.advance_hours(6.0);
        assert_eq!(h.store.current().unwrap().level, 50.0);

        h.clock.advance_hours(12.0);
        assert_eq!(h.store.current().unwrap().level, 12.5);
    }

    #[test]
    fn test_add_with_offset_in_either_direction() {
        let mut h = harness();

        h.store.add(100.0, 360.0).unwrap();
        h.store.add(100.0, -360.0).unwrap();

        let data = h.storage.snapshot();
        let expected = T0 - 6.0 * SECONDS_PER_HOUR;
        assert!(data.doses.iter().all(|d| d.timestamp == expected));
        assert_eq!(h.store.current().unwrap().level, 100.0);
    }

    #[test]
    fn test_invalid_amounts_leave_store_unchanged() {
        let mut h = harness();
        h.store.add(50.0, 0.0).unwrap();
        let before = h.storage.snapshot();

        for amount in [-5.0, 0.0, 1500.0, f64::NAN] {
            let result = h.store.add(amount, 0.0);
            assert!(
                matches!(result, Err(Error::InvalidAmount { .. })),
                "amount {} should be rejected",
                amount
            );
        }
        assert_eq!(h.storage.snapshot(), before);
    }

    #[test]
    fn test_max_amount_is_inclusive() {
        let mut h = harness();
        assert!(h.store.add(1000.0, 0.0).is_ok());
    }

    #[test]
    fn test_configured_max_dose() {
        let mut h = harness();
        h.store = h.store.with_limits(LimitsConfig {
            max_dose_mg: 200.0,
            undo_limit: None,
        });
        assert!(matches!(
            h.store.add(250.0, 0.0),
            Err(Error::InvalidAmount { max, .. }) if max == 200.0
        ));
    }

    #[test]
    fn test_non_finite_offset_rejected() {
        let mut h = harness();
        assert!(matches!(
            h.store.add(100.0, f64::INFINITY),
            Err(Error::InvalidNumericInput(_))
        ));
        assert!(h.storage.snapshot().doses.is_empty());
    }

    #[test]
    fn test_add_then_undo_restores_doses_but_not_next_id() {
        let mut h = harness();
        h.store.add(80.0, 0.0).unwrap();
        let before = h.storage.snapshot();

        h.store.add(120.0, 0.0).unwrap();
        let removed = h.store.undo().unwrap().unwrap();
        assert_eq!(removed.amount, 120.0);

        let after = h.storage.snapshot();
        assert_eq!(after.doses, before.doses);
        assert_eq!(after.next_id, before.next_id + 1);
    }

    #[test]
    fn test_undo_then_redo_restores_exact_dose() {
        let mut h = harness();
        h.store.add(75.0, 90.0).unwrap();

        let removed = h.store.undo().unwrap().unwrap();
        h.clock.advance_hours(1.0);
        let restored = h.store.redo().unwrap().unwrap();

        assert_eq!(restored, removed);
        assert_eq!(h.storage.snapshot().doses, vec![removed]);
        assert!(h.storage.snapshot().undone.is_empty());
    }

    #[test]
    fn test_undo_uses_insertion_order_not_timestamp() {
        let mut h = harness();
        h.store.add(100.0, 0.0).unwrap();
        h.store.add(50.0, 120.0).unwrap(); // backdated, inserted last

        let removed = h.store.undo().unwrap().unwrap();
        assert_eq!(removed.amount, 50.0);
    }

    #[test]
    fn test_undo_and_redo_on_empty_are_noops() {
        let mut h = harness();
        assert_eq!(h.store.undo().unwrap(), None);
        assert_eq!(h.store.redo().unwrap(), None);
        assert_eq!(h.storage.snapshot(), StoreData::default());
    }

    #[test]
    fn test_undo_limit_from_config() {
        let mut h = harness();
        h.store = h.store.with_limits(LimitsConfig {
            max_dose_mg: 1000.0,
            undo_limit: Some(1),
        });
        h.store.add(10.0, 0.0).unwrap();
        h.store.add(20.0, 0.0).unwrap();
        h.store.undo().unwrap();
        h.store.undo().unwrap();

        assert_eq!(h.storage.snapshot().undone.len(), 1);
        assert_eq!(h.store.redo().unwrap().unwrap().amount, 10.0);
        assert_eq!(h.store.redo().unwrap(), None);
    }

    #[test]
    fn test_mutations_invalidate_cache() {
        let mut h = harness();

        h.store.current().unwrap();
        assert!(h.cache.entry().is_some());
        h.store.add(100.0, 0.0).unwrap();
        assert!(h.cache.entry().is_none());

        h.store.current().unwrap();
        h.store.undo().unwrap();
        assert!(h.cache.entry().is_none());

        h.store.current().unwrap();
        h.store.redo().unwrap();
        assert!(h.cache.entry().is_none());

        h.store.current().unwrap();
        h.store.prune().unwrap();
        assert!(h.cache.entry().is_none());
    }

    #[test]
    fn test_current_always_recomputes_and_persists() {
        let mut h = harness();
        h.store.add(100.0, 0.0).unwrap();

        let first = h.store.current().unwrap();
        h.clock.advance_hours(6.0);
        let second = h.store.current().unwrap();

        assert_eq!(first.level, 100.0);
        assert_eq!(second.level, 50.0);
        assert_eq!(second.timestamp, T0 + 6.0 * SECONDS_PER_HOUR);
        assert_eq!(h.cache.entry(), Some(second));
    }

    #[test]
    fn test_history_orders_by_timestamp_and_limits() {
        let mut h = harness();
        h.store.add(100.0, 0.0).unwrap();
        h.store.add(200.0, 360.0).unwrap();
        h.store.add(300.0, 60.0).unwrap();

        let history = h.store.history(2).unwrap();
        let amounts: Vec<f64> = history.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![300.0, 100.0]);

        let all = h.store.history(5).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].amount, 200.0);
        assert_eq!(all[0].hours_ago, 6.0);
        assert_eq!(all[0].remaining, 100.0);
    }

    #[test]
    fn test_recent_uses_insertion_order() {
        let mut h = harness();
        h.store.add(100.0, 0.0).unwrap();
        h.store.add(200.0, 360.0).unwrap();
        h.store.add(300.0, 60.0).unwrap();

        let recent = h.store.recent(2).unwrap();
        let amounts: Vec<f64> = recent.iter().map(|d| d.amount).collect();
        assert_eq!(amounts, vec![200.0, 300.0]);
    }

    #[test]
    fn test_prune_removes_only_fully_decayed() {
        let mut h = harness();
        h.store.add(100.0, 0.0).unwrap();
        h.clock.advance_hours(59.0);
        h.store.add(50.0, 0.0).unwrap();

        h.clock.advance_hours(1.0);
        let removed = h.store.prune().unwrap();

        assert_eq!(removed, 1);
        let doses = h.storage.snapshot().doses;
        assert_eq!(doses.len(), 1);
        assert_eq!(doses[0].amount, 50.0);
    }

    #[test]
    fn test_timeseries_without_doses_is_zero() {
        let h = harness();
        let points = h
            .store
            .timeseries(None, None, timeseries::DEFAULT_INTERVAL_MINUTES)
            .unwrap();
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.level == 0.0));
    }

    #[test]
    fn test_check_future_dose_does_not_mutate() {
        let mut h = harness();
        h.store.add(100.0, 0.0).unwrap();
        h.store.current().unwrap();
        let before = h.storage.snapshot();
        let cached = h.cache.entry();

        let projection = h.store.check_future_dose(100.0, 0.0).unwrap();

        assert_eq!(projection.current_level, 100.0);
        assert_eq!(projection.with_dose_level, 200.0);
        assert_eq!(projection.checkpoints.len(), 3);
        assert!(projection
            .checkpoints
            .iter()
            .all(|c| c.timestamp > T0 && c.level < 200.0));
        assert_eq!(h.storage.snapshot(), before);
        assert_eq!(h.cache.entry(), cached);
    }

    #[test]
    fn test_check_future_dose_validates_amount() {
        let h = harness();
        assert!(matches!(
            h.store.check_future_dose(0.0, 0.0),
            Err(Error::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_open_persists_to_data_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(temp_dir.path());
        let mut store = DoseStore::open(&paths, &Config::default());

        store.add(100.0, 0.0).unwrap();
        assert!(paths.data_file.exists());
        assert!(!paths.cache_file.exists());

        store.current().unwrap();
        assert!(paths.cache_file.exists());

        let reopened = DoseStore::open(&paths, &Config::default());
        assert_eq!(reopened.doses().unwrap().len(), 1);
    }
}
