#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! A write-through, advisory cache in front of the Tax-Rate Catalog.
//!
//! No source file in the original implementation carries a dedicated
//! distributed-cache wrapper class; both `services/tax_rate_service.py`
//! and `services/tax/tax_rate.py` resolve every lookup straight against
//! the in-process catalog. This crate implements the cache contract
//! from the distributed-cache behavior described for the Order
//! Calculator: bulk-load once at worker start (`HGETALL`-equivalent),
//! serve lookups from that snapshot, queue misses, and flush once at
//! worker end (`HSET`-equivalent) rather than on every miss. A cache
//! failure never fails a lookup; it only means the catalog is
//! consulted directly and the write-back is skipped.

use std::collections::HashMap;
use std::sync::Mutex;

use geo_tax_models::error::ValidationError;
use geo_tax_models::tax::TaxRateBreakdown;
use geo_tax_rates::TaxRateCatalog;

/// A backing store a [`TaxRateCache`] can bulk-load from and flush to.
/// The in-process [`MemoryCacheStore`] is the default; a real deployment
/// can implement this against Redis or any other key-value store
/// reachable from `TAX_CACHE_URL`.
pub trait CacheStore: Send + Sync {
    /// Bulk-loads every entry currently in the store (`HGETALL`).
    ///
    /// # Errors
    ///
    /// Returns a description of the underlying failure; callers treat
    /// this as "cache unavailable", not as a fatal error.
    fn load_all(&self) -> Result<HashMap<String, String>, String>;

    /// Bulk-writes every entry accumulated during a worker's run
    /// (`HSET`).
    ///
    /// # Errors
    ///
    /// Returns a description of the underlying failure.
    fn store_all(&self, entries: &HashMap<String, String>) -> Result<(), String>;
}

/// An in-memory [`CacheStore`] used when `TAX_CACHE_URL` is unset, so
/// the pipeline runs standalone without an external cache.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
}

impl CacheStore for MemoryCacheStore {
    fn load_all(&self) -> Result<HashMap<String, String>, String> {
        Ok(self
            .entries
            .lock()
            .map_err(|err| err.to_string())?
            .clone())
    }

    fn store_all(&self, entries: &HashMap<String, String>) -> Result<(), String> {
        let mut guard = self.entries.lock().map_err(|err| err.to_string())?;
        for (key, value) in entries {
            guard.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Write-through cache for [`TaxRateBreakdown`] lookups, sitting in
/// front of a [`TaxRateCatalog`].
pub struct TaxRateCache<S: CacheStore> {
    store: S,
    snapshot: Mutex<HashMap<String, TaxRateBreakdown>>,
    pending: Mutex<HashMap<String, TaxRateBreakdown>>,
}

impl<S: CacheStore> TaxRateCache<S> {
    /// Loads the backing store's snapshot into memory. A load failure
    /// is logged and treated as an empty cache, never propagated.
    pub fn new(store: S) -> Self {
        let snapshot = match store.load_all() {
            Ok(raw) => deserialize_snapshot(&raw),
            Err(err) => {
                log::warn!("tax rate cache load failed, starting empty: {err}");
                HashMap::new()
            }
        };

        Self {
            store,
            snapshot: Mutex::new(snapshot),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a reporting code, preferring the in-memory snapshot over
    /// the catalog. On a miss, the catalog result (if any) is queued for
    /// the next [`Self::flush`] rather than written back immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `reporting_code` fails
    /// normalization.
    pub fn lookup(
        &self,
        catalog: &TaxRateCatalog,
        reporting_code: &str,
    ) -> Result<Option<TaxRateBreakdown>, ValidationError> {
        let normalized = geo_tax_models::normalize_reporting_code(reporting_code)?;

        if let Ok(snapshot) = self.snapshot.lock() {
            if let Some(breakdown) = snapshot.get(&normalized) {
                return Ok(Some(breakdown.clone()));
            }
        }

        let Some(breakdown) = catalog.lookup(&normalized)? else {
            return Ok(None);
        };

        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(normalized, breakdown.clone());
        }

        Ok(Some(breakdown))
    }

    /// Writes every pending entry accumulated since construction (or
    /// the last flush) to the backing store in one bulk call. Failures
    /// are logged, not propagated: a cache flush never fails an import.
    pub fn flush(&self) {
        let pending = match self.pending.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };

        if pending.is_empty() {
            return;
        }

        let serialized = serialize_snapshot(&pending);
        if let Err(err) = self.store.store_all(&serialized) {
            log::warn!("tax rate cache flush failed, discarding {} entries: {err}", pending.len());
        }
    }
}

fn serialize_snapshot(entries: &HashMap<String, TaxRateBreakdown>) -> HashMap<String, String> {
    entries
        .iter()
        .filter_map(|(code, breakdown)| {
            serde_json::to_string(breakdown)
                .ok()
                .map(|json| (code.clone(), json))
        })
        .collect()
}

fn deserialize_snapshot(raw: &HashMap<String, String>) -> HashMap<String, TaxRateBreakdown> {
    raw.iter()
        .filter_map(|(code, json)| {
            serde_json::from_str::<TaxRateBreakdown>(json)
                .ok()
                .map(|breakdown| (code.clone(), breakdown))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_catalog() -> TaxRateCatalog {
        TaxRateCatalog::from_json(&json!({
            "36": {
                "state_rate": [{ "name": "New York State", "rate": 0.04 }],
                "county_rate": [],
                "city_rate": [],
                "special_rates": []
            }
        }))
        .unwrap()
    }

    #[test]
    fn miss_falls_through_to_catalog_and_queues_for_flush() {
        let cache = TaxRateCache::new(MemoryCacheStore::default());
        let catalog = sample_catalog();

        let result = cache.lookup(&catalog, "36").unwrap().unwrap();
        assert_eq!(result.reporting_code, "0036");
    }

    #[test]
    fn flush_persists_pending_entries_for_the_next_worker() {
        let catalog = sample_catalog();
        let shared = std::sync::Arc::new(MemoryCacheStore::default());

        struct SharedStore(std::sync::Arc<MemoryCacheStore>);
        impl CacheStore for SharedStore {
            fn load_all(&self) -> Result<HashMap<String, String>, String> {
                self.0.load_all()
            }
            fn store_all(&self, entries: &HashMap<String, String>) -> Result<(), String> {
                self.0.store_all(entries)
            }
        }

        {
            let cache = TaxRateCache::new(SharedStore(shared.clone()));
            let _ = cache.lookup(&catalog, "36").unwrap();
            cache.flush();
        }

        // A second worker loads the store's snapshot at construction
        // and should hit it without touching the catalog.
        let second = TaxRateCache::new(SharedStore(shared));
        assert!(
            second
                .snapshot
                .lock()
                .unwrap()
                .contains_key("0036")
        );
    }

    #[test]
    fn unknown_code_returns_none_without_queuing() {
        let cache = TaxRateCache::new(MemoryCacheStore::default());
        let catalog = sample_catalog();
        assert!(cache.lookup(&catalog, "9999").unwrap().is_none());
    }
}
