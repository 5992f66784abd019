//! Query facade over a snapshot.
//!
//! Every query is a pure function of its [`QueryParams`] and one snapshot.
//! The facade validates the date window, resolves the country filter, and
//! then routes to the cheapest way of answering:
//!
//! ```text
//!                     ┌─ full window, no filter ─► precomputed cache
//! params ─► window ─► ├─ country filter         ─► one serial unit
//!                     └─ otherwise              ─► fan-out, one unit per country
//! ```
//!
//! A reversed window is rejected with [`QueryError::InvalidRange`] before any
//! aggregation work starts, and before the country filter is looked at.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! # use casecount::store::Store;
//! # use casecount::query::QueryParams;
//! # let store = Store::new(Default::default())?;
//! let params = QueryParams::new("1/24/20", "1/26/20", "China");
//! for (key, country) in store.country_aggregates(&params)? {
//!     println!("{key}: {} confirmed", country.aggregate.statistics.confirmed);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use crate::aggregate::{Aggregator, reduce_country, roll_up_aggregates};
use crate::error::QueryError;
use crate::names::{CountryLookup, NameResolver};
use crate::reduce::{ReduceMode, reduce_range, slice_range};
use crate::series::{Aggregate, CountryBucket, DailyStat, RegionSeries, Statistics};
use crate::snapshot::Snapshot;

pub use crate::aggregate::{CountryAggregate, CountrySeries, CountryStates};

/// Parameters shared by every query.
///
/// Empty strings mean "unbounded" for dates and "no filter" for the country.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// First day of the window, inclusive.
    pub from: String,
    /// Last day of the window, inclusive.
    pub to: String,
    /// Country key, name, or code to restrict results to.
    pub country: String,
}

impl QueryParams {
    /// Creates query parameters.
    pub fn new(from: impl Into<String>, to: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            country: country.into(),
        }
    }

    /// All dates, all countries.
    pub fn all() -> Self {
        Self::default()
    }

    /// A date window over all countries.
    pub fn between(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, "")
    }

    /// Restricts results to one country.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }
}

/// Resolved day indices of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    from: i64,
    to: i64,
}

/// Answers queries against one snapshot.
pub struct QueryEngine<'a> {
    snapshot: &'a Snapshot,
    aggregator: &'a Aggregator,
    lookup: &'a dyn CountryLookup,
}

impl<'a> QueryEngine<'a> {
    /// Creates an engine over `snapshot`.
    pub fn new(
        snapshot: &'a Snapshot,
        aggregator: &'a Aggregator,
        lookup: &'a dyn CountryLookup,
    ) -> Self {
        Self {
            snapshot,
            aggregator,
            lookup,
        }
    }

    /// Per-day series of every sub-region, sliced to the window.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`] or [`QueryError::CountryNotFound`].
    pub fn state_series(
        &self,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, CountryStates<RegionSeries>>, QueryError> {
        let window = self.window(params)?;
        let filter = self.country_filter(params)?;
        tracing::debug!(?window, country = filter, "state series query");

        Ok(self
            .selected(filter)
            .map(|(key, bucket)| {
                let states = bucket
                    .regions
                    .iter()
                    .map(|(region, series)| {
                        let counts = slice_range(&series.counts, window.from, window.to).to_vec();
                        (
                            region.clone(),
                            RegionSeries::new(series.location, series.population, counts),
                        )
                    })
                    .collect();
                (
                    key.clone(),
                    CountryStates {
                        name: bucket.name.clone(),
                        states,
                    },
                )
            })
            .collect())
    }

    /// Totals of every sub-region over the window.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`] or [`QueryError::CountryNotFound`].
    pub fn state_aggregates(
        &self,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, CountryStates<Aggregate>>, QueryError> {
        let window = self.window(params)?;
        let filter = self.country_filter(params)?;
        tracing::debug!(?window, country = filter, "state aggregate query");

        let full = self.is_full(window);
        let cache = self.snapshot.full_state_aggregates();
        Ok(match filter {
            None if full => cache.clone(),
            None => self
                .aggregator
                .state_aggregates(self.snapshot.buckets(), window.from, window.to),
            Some(key) => {
                let states = if full {
                    cache.get(key).cloned()
                } else {
                    self.bucket(key).map(|bucket| {
                        reduce_country(bucket, window.from, window.to, self.aggregator.mode())
                    })
                };
                states.map(|states| (key.to_string(), states)).into_iter().collect()
            }
        })
    }

    /// Per-day country roll-ups, sliced to the window.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`] or [`QueryError::CountryNotFound`].
    pub fn country_series(
        &self,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, CountrySeries>, QueryError> {
        let window = self.window(params)?;
        let filter = self.country_filter(params)?;
        tracing::debug!(?window, country = filter, "country series query");

        Ok(self
            .snapshot
            .country_series()
            .iter()
            .filter(|(key, _)| filter.is_none_or(|wanted| wanted == key.as_str()))
            .map(|(key, country)| {
                let series = &country.series;
                let counts = slice_range(&series.counts, window.from, window.to).to_vec();
                (
                    key.clone(),
                    CountrySeries {
                        name: country.name.clone(),
                        series: RegionSeries::new(series.location, series.population, counts),
                    },
                )
            })
            .collect())
    }

    /// Country totals over the window.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`] or [`QueryError::CountryNotFound`].
    pub fn country_aggregates(
        &self,
        params: &QueryParams,
    ) -> Result<BTreeMap<String, CountryAggregate>, QueryError> {
        let window = self.window(params)?;
        let filter = self.country_filter(params)?;
        tracing::debug!(?window, country = filter, "country aggregate query");

        let full = self.is_full(window);
        let cache = self.snapshot.full_country_aggregates();
        Ok(match filter {
            None if full => cache.clone(),
            None => self
                .aggregator
                .country_aggregates(self.snapshot.buckets(), window.from, window.to),
            Some(key) => {
                let country = if full {
                    cache.get(key).cloned()
                } else {
                    self.bucket(key).map(|bucket| {
                        let states =
                            reduce_country(bucket, window.from, window.to, self.aggregator.mode());
                        CountryAggregate {
                            aggregate: roll_up_aggregates(&states.states),
                            name: states.name,
                        }
                    })
                };
                country.map(|country| (key.to_string(), country)).into_iter().collect()
            }
        })
    }

    /// Per-day world totals, sliced to the window.
    ///
    /// The country filter does not apply to world queries.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`].
    pub fn world_series(&self, params: &QueryParams) -> Result<Vec<DailyStat>, QueryError> {
        let window = self.window(params)?;
        tracing::debug!(?window, "world series query");
        Ok(slice_range(self.snapshot.world_series(), window.from, window.to).to_vec())
    }

    /// World totals over the window.
    ///
    /// The country filter does not apply to world queries. When negative
    /// deltas are clamped, clamping happens per region before summing, so the
    /// total still equals the sum of [`country_aggregates`](Self::country_aggregates).
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`].
    pub fn world_aggregate(&self, params: &QueryParams) -> Result<Statistics, QueryError> {
        let window = self.window(params)?;
        tracing::debug!(?window, "world aggregate query");
        Ok(match self.aggregator.mode() {
            ReduceMode::PassThrough => reduce_range(
                self.snapshot.world_series(),
                window.from,
                window.to,
                ReduceMode::PassThrough,
            ),
            ReduceMode::ClampNegative => self
                .aggregator
                .country_aggregates(self.snapshot.buckets(), window.from, window.to)
                .values()
                .map(|country| country.aggregate.statistics)
                .sum(),
        })
    }

    fn window(&self, params: &QueryParams) -> Result<Window, QueryError> {
        let (from, to) = self
            .snapshot
            .bounds()
            .resolve_indices(&params.from, &params.to);
        if from > to {
            return Err(QueryError::InvalidRange {
                from: params.from.clone(),
                to: params.to.clone(),
            });
        }
        Ok(Window { from, to })
    }

    fn is_full(&self, window: Window) -> bool {
        window.from == 0 && window.to == self.snapshot.bounds().last_index()
    }

    fn country_filter(&self, params: &QueryParams) -> Result<Option<&'a str>, QueryError> {
        if params.country.trim().is_empty() {
            return Ok(None);
        }
        NameResolver::new(self.snapshot.buckets(), self.lookup)
            .resolve_or_suggest(&params.country)
            .map(Some)
    }

    fn bucket(&self, key: &str) -> Option<&'a CountryBucket> {
        self.snapshot.buckets().get(key)
    }

    fn selected(
        &self,
        filter: Option<&'a str>,
    ) -> Box<dyn Iterator<Item = (&'a String, &'a CountryBucket)> + 'a> {
        let buckets = self.snapshot.buckets();
        match filter {
            Some(key) => Box::new(buckets.get_key_value(key).into_iter()),
            None => Box::new(buckets.iter()),
        }
    }
}
