//! File-backed document store for manual adjustments and the reference
//! portfolio.
//!
//! Each collection is one JSON file holding a map from composite id to
//! record. Writes load the file, replace the key, and rewrite the whole
//! map; concurrent writers race and the last write wins, matching the
//! upstream store these files mirror. A missing file reads as an empty
//! collection.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;

use opsdesk::{AccountId, ManualAdjustment, ReferencePosition, Ticker, validate_reference};

use crate::error::{Error, Result};
use crate::sample;

const ADJUSTMENTS_FILE: &str = "adjustments.json";
const REFERENCE_FILE: &str = "reference.json";

/// Handle onto the on-disk store directory.
pub struct Store {
    dir: PathBuf,
}

fn reference_key(strategy: &str, ticker: Ticker) -> String {
    format!("{strategy}_{ticker}")
}

impl Store {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Store(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn adjustments_path(&self) -> PathBuf {
        self.dir.join(ADJUSTMENTS_FILE)
    }

    fn reference_path(&self) -> PathBuf {
        self.dir.join(REFERENCE_FILE)
    }

    fn read_map<T: DeserializeOwned>(&self, path: &Path) -> Result<BTreeMap<String, T>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(path).map_err(|e| Error::StoreRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_map<T: Serialize>(&self, path: &Path, map: &BTreeMap<String, T>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        fs::write(path, json)
            .map_err(|e| Error::Store(format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    /// All adjustments recorded for a strategy, closed ones included,
    /// sorted by (account, ticker).
    pub fn load_adjustments(&self, strategy: &str) -> Result<Vec<ManualAdjustment>> {
        let map: BTreeMap<String, ManualAdjustment> = self.read_map(&self.adjustments_path())?;
        let mut rows: Vec<ManualAdjustment> = map
            .into_values()
            .filter(|a| a.strategy == strategy)
            .collect();
        rows.sort_by_key(|a| (a.account, a.ticker));
        Ok(rows)
    }

    /// The reference portfolio for a strategy, validated, sorted by ticker.
    pub fn load_reference(&self, strategy: &str) -> Result<Vec<ReferencePosition>> {
        let map: BTreeMap<String, ReferencePosition> = self.read_map(&self.reference_path())?;
        let mut rows: Vec<ReferencePosition> = map
            .into_values()
            .filter(|r| r.strategy == strategy)
            .collect();
        rows.sort_by_key(|r| r.ticker);
        validate_reference(&rows).map_err(|e| Error::Store(e.to_string()))?;
        Ok(rows)
    }

    /// Insert or replace the adjustment at its composite id.
    pub fn upsert_adjustment(&self, adjustment: &ManualAdjustment) -> Result<()> {
        let path = self.adjustments_path();
        let mut map: BTreeMap<String, ManualAdjustment> = self.read_map(&path)?;
        map.insert(adjustment.composite_id(), adjustment.clone());
        self.write_map(&path, &map)
    }

    /// Zero the delta of an existing adjustment, keeping the record and its
    /// reason on file. Returns the closed record, or `None` if the key was
    /// never recorded.
    pub fn close_adjustment(
        &self,
        strategy: &str,
        account: AccountId,
        ticker: Ticker,
    ) -> Result<Option<ManualAdjustment>> {
        let path = self.adjustments_path();
        let mut map: BTreeMap<String, ManualAdjustment> = self.read_map(&path)?;
        let key = ManualAdjustment::key_for(strategy, account, ticker);
        let Some(adjustment) = map.get_mut(&key) else {
            return Ok(None);
        };
        adjustment.close();
        let closed = adjustment.clone();
        self.write_map(&path, &map)?;
        Ok(Some(closed))
    }

    /// Insert or replace a reference row, rejecting the write if it would
    /// leave the strategy's portfolio invalid.
    pub fn upsert_reference(&self, position: &ReferencePosition) -> Result<()> {
        let path = self.reference_path();
        let mut map: BTreeMap<String, ReferencePosition> = self.read_map(&path)?;
        map.insert(
            reference_key(&position.strategy, position.ticker),
            position.clone(),
        );
        let rows: Vec<ReferencePosition> = map
            .values()
            .filter(|r| r.strategy == position.strategy)
            .cloned()
            .collect();
        validate_reference(&rows).map_err(|e| Error::Store(e.to_string()))?;
        self.write_map(&path, &map)
    }

    /// Remove a reference row. Returns whether anything was removed.
    pub fn delete_reference(&self, strategy: &str, ticker: Ticker) -> Result<bool> {
        let path = self.reference_path();
        let mut map: BTreeMap<String, ReferencePosition> = self.read_map(&path)?;
        let removed = map.remove(&reference_key(strategy, ticker)).is_some();
        if removed {
            self.write_map(&path, &map)?;
        }
        Ok(removed)
    }

    /// Adjustments with the sample dataset as fallback on a broken read.
    ///
    /// Read-only views stay usable when the store is unreadable; the flag
    /// tells the caller the data is canned. Mutating and executing paths
    /// must use [`Store::load_adjustments`] instead.
    pub fn load_adjustments_or_sample(&self, strategy: &str) -> (Vec<ManualAdjustment>, bool) {
        match self.load_adjustments(strategy) {
            Ok(rows) => (rows, false),
            Err(e) => {
                warn!("Adjustment store unreadable, serving sample data: {e}");
                (sample::sample_adjustments(strategy), true)
            }
        }
    }

    /// Reference portfolio with the sample dataset as fallback.
    pub fn load_reference_or_sample(&self, strategy: &str) -> (Vec<ReferencePosition>, bool) {
        match self.load_reference(strategy) {
            Ok(rows) => (rows, false),
            Err(e) => {
                warn!("Reference store unreadable, serving sample data: {e}");
                (sample::sample_reference(strategy), true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(strategy: &str, account: u64, ticker: &str, delta: i64) -> ManualAdjustment {
        ManualAdjustment::new(
            strategy,
            AccountId(account),
            Ticker::new(ticker),
            delta,
            None,
            "test",
        )
    }

    fn refpos(strategy: &str, ticker: &str, pct: f64) -> ReferencePosition {
        ReferencePosition {
            strategy: strategy.into(),
            ticker: Ticker::new(ticker),
            target_price: 25.0,
            target_quantity: 100,
            target_pct: pct,
        }
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.load_adjustments("alpha").unwrap().is_empty());
        assert!(store.load_reference("alpha").unwrap().is_empty());
    }

    #[test]
    fn adjustment_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.upsert_adjustment(&adj("alpha", 1, "PETR4", 100)).unwrap();
        store.upsert_adjustment(&adj("alpha", 2, "VALE3", -50)).unwrap();

        let rows = store.load_adjustments("alpha").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account, AccountId(1));
        assert_eq!(rows[1].quantity_delta, -50);
    }

    #[test]
    fn upsert_same_key_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.upsert_adjustment(&adj("alpha", 1, "PETR4", 100)).unwrap();
        store.upsert_adjustment(&adj("alpha", 1, "PETR4", 250)).unwrap();

        let rows = store.load_adjustments("alpha").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity_delta, 250);
    }

    #[test]
    fn strategies_do_not_leak_into_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.upsert_adjustment(&adj("alpha", 1, "PETR4", 100)).unwrap();
        store.upsert_adjustment(&adj("beta", 1, "PETR4", 900)).unwrap();

        let rows = store.load_adjustments("alpha").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity_delta, 100);
    }

    #[test]
    fn close_keeps_record_with_zero_delta() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.upsert_adjustment(&adj("alpha", 1, "PETR4", 100)).unwrap();
        let closed = store
            .close_adjustment("alpha", AccountId(1), Ticker::new("PETR4"))
            .unwrap();
        assert!(closed.unwrap().is_closed());

        let rows = store.load_adjustments("alpha").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity_delta, 0);
        assert_eq!(rows[0].reason, "test");
    }

    #[test]
    fn close_unknown_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let closed = store
            .close_adjustment("alpha", AccountId(9), Ticker::new("PETR4"))
            .unwrap();
        assert!(closed.is_none());
    }

    #[test]
    fn reference_roundtrip_sorted_by_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.upsert_reference(&refpos("alpha", "VALE3", 20.0)).unwrap();
        store.upsert_reference(&refpos("alpha", "PETR4", 30.0)).unwrap();

        let rows = store.load_reference("alpha").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker.as_str(), "PETR4");
        assert_eq!(rows[1].ticker.as_str(), "VALE3");
    }

    #[test]
    fn overallocating_upsert_is_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.upsert_reference(&refpos("alpha", "PETR4", 60.0)).unwrap();
        let err = store.upsert_reference(&refpos("alpha", "VALE3", 50.0));
        assert!(err.is_err());

        let rows = store.load_reference("alpha").unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn delete_reference_reports_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.upsert_reference(&refpos("alpha", "PETR4", 30.0)).unwrap();
        assert!(store.delete_reference("alpha", Ticker::new("PETR4")).unwrap());
        assert!(!store.delete_reference("alpha", Ticker::new("PETR4")).unwrap());
        assert!(store.load_reference("alpha").unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_fails_strict_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        fs::write(dir.path().join(ADJUSTMENTS_FILE), "{ not json").unwrap();
        assert!(store.load_adjustments("alpha").is_err());
    }

    #[test]
    fn corrupt_file_falls_back_to_sample() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        fs::write(dir.path().join(REFERENCE_FILE), "{ not json").unwrap();

        let (rows, degraded) = store.load_reference_or_sample("alpha");
        assert!(degraded);
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|r| r.strategy == "alpha"));
    }

    #[test]
    fn healthy_read_is_not_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.upsert_adjustment(&adj("alpha", 1, "PETR4", 100)).unwrap();

        let (rows, degraded) = store.load_adjustments_or_sample("alpha");
        assert!(!degraded);
        assert_eq!(rows.len(), 1);
    }
}
