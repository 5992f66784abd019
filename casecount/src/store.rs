//! Snapshot ownership and refresh.
//!
//! The [`Store`] is the top-level handle of the engine. It owns the current
//! [`Snapshot`] behind a reference count and answers every query against
//! whichever snapshot was current when the query started.
//!
//! # Design
//!
//! ```text
//!  refresh():  lock refresh ─► build snapshot (no lock held by readers) ─► write-lock swap ─► unlock
//!  query():    read-lock ─► clone Arc ─► unlock ─► compute against the clone
//! ```
//!
//! - Refreshes are serialized by a mutex that also carries the generation
//!   counter.
//! - A new snapshot is built entirely out of place. The write lock is held
//!   only for the pointer swap, so readers never wait on a build.
//! - A query holds its own `Arc` to the snapshot it started with; a swap in
//!   the middle of a query does not affect its result.
//! - A failed refresh leaves the previous snapshot in service.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use casecount::config::EngineConfig;
//! use casecount::query::QueryParams;
//! use casecount::snapshot::SnapshotInput;
//! use casecount::store::Store;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new(EngineConfig::default())?;
//! store.refresh(SnapshotInput::load("./snapshot.json")?)?;
//!
//! let world = store.world_aggregate(&QueryParams::between("1/24/20", "1/26/20"))?;
//! println!("{} confirmed", world.confirmed);
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::aggregate::Aggregator;
use crate::config::EngineConfig;
use crate::error::{IngestError, QueryError, Result};
use crate::names::{CountryDirectory, CountryLookup};
use crate::query::{CountryAggregate, CountrySeries, CountryStates, QueryEngine, QueryParams};
use crate::series::{Aggregate, DailyStat, RegionSeries, Statistics};
use crate::snapshot::{Snapshot, SnapshotInput};

/// Top-level handle of the aggregation engine.
///
/// # Thread Safety
///
/// `Store` is `Send + Sync`. Share it behind an `Arc`; any number of threads
/// may query while another refreshes.
pub struct Store {
    /// Validated engine configuration.
    config: EngineConfig,
    /// Fan-out executor shared by every query.
    aggregator: Aggregator,
    /// Country code and population directory.
    lookup: Arc<dyn CountryLookup>,
    /// The snapshot in service, if any has been loaded.
    current: RwLock<Option<Arc<Snapshot>>>,
    /// Serializes refreshes; holds the last generation handed out.
    refresh_lock: Mutex<u64>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("aggregator", &self.aggregator)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Creates an empty store using the built-in country directory, extended
    /// by `config.countries` if set.
    ///
    /// # Errors
    ///
    /// Returns a config error if the configuration is invalid, the countries
    /// file cannot be loaded, or the worker pool cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut directory = CountryDirectory::builtin();
        if let Some(path) = &config.countries {
            let entries = CountryDirectory::load(path)?;
            tracing::debug!(path = %path.display(), entries = entries.len(), "extending country directory");
            directory.extend(entries);
        }
        Self::with_lookup(config, Arc::new(directory))
    }

    /// Creates an empty store with a caller-supplied country lookup.
    ///
    /// # Errors
    ///
    /// Returns a config error if the configuration is invalid or the worker
    /// pool cannot be built.
    pub fn with_lookup(config: EngineConfig, lookup: Arc<dyn CountryLookup>) -> Result<Self> {
        config.validate()?;
        let aggregator = Aggregator::new(&config)?;
        Ok(Self {
            config,
            aggregator,
            lookup,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(0),
        })
    }

    /// Builds a snapshot from `input` and puts it in service.
    ///
    /// Unknown populations are filled from the country lookup first. Returns
    /// the generation of the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns an ingest error if the input fails validation. The previous
    /// snapshot then stays in service.
    pub fn refresh(&self, input: SnapshotInput) -> Result<u64> {
        let mut generation = self.refresh_lock.lock();
        self.install(&mut generation, input)
    }

    /// Runs `source` and, if it produces input, refreshes from it.
    ///
    /// Returns whether the snapshot was replaced. Failures are logged and
    /// the previous snapshot stays in service.
    pub fn try_refresh<F>(&self, source: F) -> bool
    where
        F: FnOnce() -> std::result::Result<SnapshotInput, IngestError>,
    {
        let mut generation = self.refresh_lock.lock();
        let input = match source() {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(error = %e, "snapshot source failed, keeping current snapshot");
                return false;
            }
        };
        self.install(&mut generation, input).is_ok()
    }

    fn install(&self, generation: &mut u64, mut input: SnapshotInput) -> Result<u64> {
        input.apply_populations(self.lookup.as_ref());
        let next = *generation + 1;
        let snapshot = Snapshot::build(input, &self.aggregator, next).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected snapshot, keeping current snapshot");
        })?;

        let countries = snapshot.buckets().len();
        let days = snapshot.day_count();
        *self.current.write() = Some(Arc::new(snapshot));
        *generation = next;

        tracing::info!(generation = next, countries, days, "snapshot swapped in");
        Ok(next)
    }

    /// The snapshot currently in service.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoSnapshot`] before the first successful refresh.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| QueryError::NoSnapshot.into())
    }

    /// Generation of the snapshot in service; 0 before the first refresh.
    pub fn generation(&self) -> u64 {
        self.current
            .read()
            .as_ref()
            .map_or(0, |snapshot| snapshot.generation())
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The country lookup used for filters and populations.
    pub fn lookup(&self) -> &dyn CountryLookup {
        self.lookup.as_ref()
    }

    /// Per-day series of every sub-region. See [`QueryEngine::state_series`].
    ///
    /// # Errors
    ///
    /// Returns a query error for a missing snapshot, reversed range, or
    /// unknown country.
    pub fn state_series(
        &self,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, CountryStates<RegionSeries>>> {
        let snapshot = self.snapshot()?;
        Ok(self.engine(&snapshot).state_series(params)?)
    }

    /// Sub-region totals. See [`QueryEngine::state_aggregates`].
    ///
    /// # Errors
    ///
    /// Returns a query error for a missing snapshot, reversed range, or
    /// unknown country.
    pub fn state_aggregates(
        &self,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, CountryStates<Aggregate>>> {
        let snapshot = self.snapshot()?;
        Ok(self.engine(&snapshot).state_aggregates(params)?)
    }

    /// Per-day country roll-ups. See [`QueryEngine::country_series`].
    ///
    /// # Errors
    ///
    /// Returns a query error for a missing snapshot, reversed range, or
    /// unknown country.
    pub fn country_series(&self, params: &QueryParams) -> Result<BTreeMap<String, CountrySeries>> {
        let snapshot = self.snapshot()?;
        Ok(self.engine(&snapshot).country_series(params)?)
    }

    /// Country totals. See [`QueryEngine::country_aggregates`].
    ///
    /// # Errors
    ///
    /// Returns a query error for a missing snapshot, reversed range, or
    /// unknown country.
    pub fn country_aggregates(
        &self,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, CountryAggregate>> {
        let snapshot = self.snapshot()?;
        Ok(self.engine(&snapshot).country_aggregates(params)?)
    }

    /// Per-day world totals. See [`QueryEngine::world_series`].
    ///
    /// # Errors
    ///
    /// Returns a query error for a missing snapshot or reversed range.
    pub fn world_series(&self, params: &QueryParams) -> Result<Vec<DailyStat>> {
        let snapshot = self.snapshot()?;
        Ok(self.engine(&snapshot).world_series(params)?)
    }

    /// World totals. See [`QueryEngine::world_aggregate`].
    ///
    /// # Errors
    ///
    /// Returns a query error for a missing snapshot or reversed range.
    pub fn world_aggregate(&self, params: &QueryParams) -> Result<Statistics> {
        let snapshot = self.snapshot()?;
        Ok(self.engine(&snapshot).world_aggregate(params)?)
    }

    fn engine<'a>(&'a self, snapshot: &'a Snapshot) -> QueryEngine<'a> {
        QueryEngine::new(snapshot, &self.aggregator, self.lookup.as_ref())
    }
}
