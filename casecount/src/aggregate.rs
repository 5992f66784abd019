//! Fan-out aggregation across countries.
//!
//! This module applies the range reducer to many regions at once and rolls
//! the results up from state level to country level, and from country level
//! to a single world series.
//!
//! # Fan-out model
//!
//! ```text
//!            ┌─► unit "cn": reduce Beijing, Hubei, Shanghai ─► slot 0 ─┐
//! caller ────┼─► unit "sg": reduce ""                      ─► slot 1 ─┼─► join ─► keyed merge
//!            └─► unit "gb": reduce London                  ─► slot 2 ─┘
//! ```
//!
//! Every "all countries" call spawns exactly one unit per country on the
//! worker pool. Units share nothing mutable; each writes its result once into
//! its own slot. The caller blocks until every unit has finished, then merges
//! the slots single-threaded, keyed by country, so completion order never
//! affects the result. Units are pure in-memory computation and never block.
//!
//! # Roll-up rules
//!
//! A country's totals are the sum over its sub-regions. Its location is the
//! unweighted mean of the sub-regions that report one, and its population is
//! the sum of theirs, unless the country has a [`WHOLE_COUNTRY`] entry, whose
//! location and population then stand for the whole country.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::reduce::{ReduceMode, reduce_range};
use crate::series::{Aggregate, CountryBucket, DailyStat, Location, RegionSeries, WHOLE_COUNTRY};

/// Per-region results for one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountryStates<T> {
    /// Display name of the country.
    pub name: String,
    /// Results keyed by sub-region.
    pub states: BTreeMap<String, T>,
}

/// A country rolled up to a single aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountryAggregate {
    /// Display name of the country.
    pub name: String,
    /// The rolled-up aggregate.
    #[serde(flatten)]
    pub aggregate: Aggregate,
}

/// A country rolled up to a single per-day series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountrySeries {
    /// Display name of the country.
    pub name: String,
    /// The rolled-up series.
    #[serde(flatten)]
    pub series: RegionSeries,
}

/// Runs per-country work units on a worker pool.
#[derive(Debug, Clone)]
pub struct Aggregator {
    /// Dedicated pool, or `None` to use rayon's global pool.
    pool: Option<Arc<rayon::ThreadPool>>,
    mode: ReduceMode,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            pool: None,
            mode: ReduceMode::PassThrough,
        }
    }
}

impl Aggregator {
    /// Creates an aggregator from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WorkerPool`] if a dedicated pool was requested
    /// and could not be built.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let pool = match config.worker_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|index| format!("casecount-fanout-{index}"))
                    .build()
                    .map_err(|source| ConfigError::WorkerPool { source })?;
                Some(Arc::new(pool))
            }
            None => None,
        };
        let mode = if config.clamp_negative_deltas {
            ReduceMode::ClampNegative
        } else {
            ReduceMode::PassThrough
        };
        Ok(Self { pool, mode })
    }

    /// The reduce mode applied to every range reduction.
    pub fn mode(&self) -> ReduceMode {
        self.mode
    }

    /// Spawns one unit per item, waits for all of them, and returns their
    /// results in input order.
    pub fn fan_out<T, R, F>(&self, items: &[T], unit: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None)
            .take(items.len())
            .collect();
        let unit = &unit;
        let mut join = || {
            rayon::scope(|scope| {
                for (slot, item) in slots.iter_mut().zip(items) {
                    scope.spawn(move |_| *slot = Some(unit(item)));
                }
            });
        };
        match &self.pool {
            Some(pool) => pool.install(join),
            None => join(),
        }
        // The scope joins every unit, so every slot is filled here.
        slots.into_iter().flatten().collect()
    }

    /// Reduces every region of every country over `[from, to]`.
    pub fn state_aggregates(
        &self,
        buckets: &HashMap<String, CountryBucket>,
        from: i64,
        to: i64,
    ) -> BTreeMap<String, CountryStates<Aggregate>> {
        let countries: Vec<(&String, &CountryBucket)> = buckets.iter().collect();
        tracing::debug!(units = countries.len(), from, to, "fanning out state aggregation");
        let mode = self.mode;
        let results = self.fan_out(&countries, |&(_, bucket)| {
            reduce_country(bucket, from, to, mode)
        });
        merge(&countries, results)
    }

    /// Reduces and rolls up every country over `[from, to]`.
    pub fn country_aggregates(
        &self,
        buckets: &HashMap<String, CountryBucket>,
        from: i64,
        to: i64,
    ) -> BTreeMap<String, CountryAggregate> {
        let countries: Vec<(&String, &CountryBucket)> = buckets.iter().collect();
        tracing::debug!(units = countries.len(), from, to, "fanning out country aggregation");
        let mode = self.mode;
        let results = self.fan_out(&countries, |&(_, bucket)| {
            let states = reduce_country(bucket, from, to, mode);
            CountryAggregate {
                aggregate: roll_up_aggregates(&states.states),
                name: states.name,
            }
        });
        merge(&countries, results)
    }

    /// Sums every country's regions into a single per-day series.
    pub fn country_series(
        &self,
        buckets: &HashMap<String, CountryBucket>,
    ) -> BTreeMap<String, CountrySeries> {
        let countries: Vec<(&String, &CountryBucket)> = buckets.iter().collect();
        tracing::debug!(units = countries.len(), "fanning out per-day country roll-up");
        let results = self.fan_out(&countries, |&(_, bucket)| CountrySeries {
            name: bucket.name.clone(),
            series: roll_up_series(bucket),
        });
        merge(&countries, results)
    }
}

fn merge<T>(countries: &[(&String, &CountryBucket)], results: Vec<T>) -> BTreeMap<String, T> {
    countries
        .iter()
        .map(|(key, _)| (*key).clone())
        .zip(results)
        .collect()
}

/// Reduces each region of one country, serially.
pub fn reduce_country(
    bucket: &CountryBucket,
    from: i64,
    to: i64,
    mode: ReduceMode,
) -> CountryStates<Aggregate> {
    let states = bucket
        .regions
        .iter()
        .map(|(region, series)| {
            let statistics = reduce_range(&series.counts, from, to, mode);
            (
                region.clone(),
                Aggregate::new(series.location, series.population, statistics),
            )
        })
        .collect();
    CountryStates {
        name: bucket.name.clone(),
        states,
    }
}

/// Combines state-level aggregates into one country-level aggregate.
pub fn roll_up_aggregates(states: &BTreeMap<String, Aggregate>) -> Aggregate {
    let statistics = states.values().map(|state| state.statistics).sum();
    let whole = states
        .get(WHOLE_COUNTRY)
        .map(|state| (state.location, state.population));
    let (location, population) = country_tag(
        states.values().map(|state| (state.location, state.population)),
        whole,
    );
    Aggregate::new(location, population, statistics)
}

/// Sums a country's regions day by day.
pub fn roll_up_series(bucket: &CountryBucket) -> RegionSeries {
    let counts = sum_series(bucket.regions.values().map(|region| region.counts.as_slice()));
    let whole = bucket
        .whole_country()
        .map(|region| (region.location, region.population));
    let (location, population) = country_tag(
        bucket
            .regions
            .values()
            .map(|region| (region.location, region.population)),
        whole,
    );
    RegionSeries::new(location, population, counts)
}

/// Sums per-day country series into the world series.
pub fn sum_world_series<'a>(countries: impl IntoIterator<Item = &'a RegionSeries>) -> Vec<DailyStat> {
    sum_series(countries.into_iter().map(|series| series.counts.as_slice()))
}

/// Day-by-day sum of equally long series; dates come from the first one.
fn sum_series<'a>(series: impl IntoIterator<Item = &'a [DailyStat]>) -> Vec<DailyStat> {
    let mut series = series.into_iter();
    let Some(first) = series.next() else {
        return Vec::new();
    };
    let mut totals = first.to_vec();
    for counts in series {
        for (total, day) in totals.iter_mut().zip(counts) {
            total.statistics += day.statistics;
        }
    }
    totals
}

/// Location and population for a rolled-up country.
fn country_tag(
    regions: impl Iterator<Item = (Option<Location>, u64)>,
    whole: Option<(Option<Location>, u64)>,
) -> (Option<Location>, u64) {
    if let Some(tag) = whole {
        return tag;
    }

    let mut population = 0u64;
    let (mut lat, mut long, mut located) = (0.0, 0.0, 0u32);
    for (location, region_population) in regions {
        population = population.saturating_add(region_population);
        if let Some(location) = location {
            lat += location.lat;
            long += location.long;
            located += 1;
        }
    }

    let location = (located > 0).then(|| {
        let n = f64::from(located);
        Location::new(lat / n, long / n)
    });
    (location, population)
}
