//! Immutable, precomputed dataset snapshots.
//!
//! A [`SnapshotInput`] is what the ingestion collaborator hands over: a
//! `country → (sub-region → RegionSeries)` map plus the first and last date.
//! [`Snapshot::build`] validates it and precomputes everything a refresh
//! cycle can compute once instead of per query:
//!
//! - the per-day roll-up of every country,
//! - the per-day world series (sum of the country roll-ups),
//! - the full-range state and country aggregates, which answer the most
//!   common query (no dates, no country filter) without any fan-out.
//!
//! A built snapshot is never mutated. Refreshing replaces it as a whole.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::{
    Aggregator, CountryAggregate, CountrySeries, CountryStates, roll_up_aggregates,
    sum_world_series,
};
use crate::dates::DateBounds;
use crate::error::IngestError;
use crate::names::CountryLookup;
use crate::series::{Aggregate, CountryBucket, DailyStat};

/// Parsed dataset handed over by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInput {
    /// First day covered by every series.
    pub first_date: NaiveDate,
    /// Last day covered by every series.
    pub last_date: NaiveDate,
    /// Country buckets keyed by canonical country key.
    pub countries: HashMap<String, CountryBucket>,
}

impl SnapshotInput {
    /// Creates an input with no countries.
    pub fn new(first_date: NaiveDate, last_date: NaiveDate) -> Self {
        Self {
            first_date,
            last_date,
            countries: HashMap::new(),
        }
    }

    /// Adds a country bucket, builder style.
    #[must_use]
    pub fn with_country(mut self, key: impl Into<String>, bucket: CountryBucket) -> Self {
        self.countries.insert(key.into(), bucket);
        self
    }

    /// Fills unknown (zero) populations from `lookup`.
    ///
    /// The country is looked up by its key first, then by its display name.
    pub fn apply_populations(&mut self, lookup: &dyn CountryLookup) {
        for (key, bucket) in &mut self.countries {
            for (region, series) in &mut bucket.regions {
                if series.population != 0 {
                    continue;
                }
                if let Some(population) = lookup
                    .population(key, region)
                    .or_else(|| lookup.population(&bucket.name, region))
                {
                    series.population = population;
                }
            }
        }
    }

    /// Reads an input from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Read`] or [`IngestError::Parse`] if the file
    /// cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| IngestError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| IngestError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// One complete, internally consistent dataset.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    bounds: DateBounds,
    buckets: HashMap<String, CountryBucket>,
    country_series: BTreeMap<String, CountrySeries>,
    world_series: Vec<DailyStat>,
    full_state_aggregates: BTreeMap<String, CountryStates<Aggregate>>,
    full_country_aggregates: BTreeMap<String, CountryAggregate>,
}

impl Snapshot {
    /// Validates `input` and precomputes roll-ups.
    ///
    /// # Errors
    ///
    /// - [`IngestError::InvalidDateBounds`] if the last date precedes the first
    /// - [`IngestError::EmptyCountry`] if a country has no regions
    /// - [`IngestError::RaggedSeries`] if any series length differs from the
    ///   number of days between the bounds
    pub fn build(
        input: SnapshotInput,
        aggregator: &Aggregator,
        generation: u64,
    ) -> Result<Self, IngestError> {
        let bounds = DateBounds::new(input.first_date, input.last_date)?;
        let expected = bounds.day_count();

        for (country, bucket) in &input.countries {
            if bucket.regions.is_empty() {
                return Err(IngestError::EmptyCountry {
                    country: country.clone(),
                });
            }
            for (region, series) in &bucket.regions {
                if series.day_count() != expected {
                    return Err(IngestError::RaggedSeries {
                        country: country.clone(),
                        region: region.clone(),
                        expected,
                        found: series.day_count(),
                    });
                }
            }
        }

        let decreasing = input
            .countries
            .values()
            .flat_map(|bucket| bucket.regions.values())
            .filter(|series| !series.is_monotonic())
            .count();
        if decreasing > 0 {
            tracing::warn!(regions = decreasing, "cumulative counts decrease in some regions");
        }

        let buckets = input.countries;
        let country_series = aggregator.country_series(&buckets);
        let world_series = sum_world_series(country_series.values().map(|country| &country.series));

        let full_state_aggregates = aggregator.state_aggregates(&buckets, 0, bounds.last_index());
        let full_country_aggregates = full_state_aggregates
            .iter()
            .map(|(key, states)| {
                (
                    key.clone(),
                    CountryAggregate {
                        name: states.name.clone(),
                        aggregate: roll_up_aggregates(&states.states),
                    },
                )
            })
            .collect();

        tracing::debug!(
            generation,
            countries = buckets.len(),
            days = expected,
            "built snapshot"
        );

        Ok(Self {
            generation,
            bounds,
            buckets,
            country_series,
            world_series,
            full_state_aggregates,
            full_country_aggregates,
        })
    }

    /// Refresh generation this snapshot was built in; starts at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Date bounds shared by every series.
    pub fn bounds(&self) -> DateBounds {
        self.bounds
    }

    /// Number of days in every series.
    pub fn day_count(&self) -> usize {
        self.bounds.day_count()
    }

    /// Country buckets keyed by canonical key.
    pub fn buckets(&self) -> &HashMap<String, CountryBucket> {
        &self.buckets
    }

    /// Total number of regions across all countries.
    pub fn region_count(&self) -> usize {
        self.buckets.values().map(|bucket| bucket.regions.len()).sum()
    }

    /// Per-day country roll-ups over the full range.
    pub fn country_series(&self) -> &BTreeMap<String, CountrySeries> {
        &self.country_series
    }

    /// Per-day world totals over the full range.
    pub fn world_series(&self) -> &[DailyStat] {
        &self.world_series
    }

    /// State aggregates over the full range.
    pub fn full_state_aggregates(&self) -> &BTreeMap<String, CountryStates<Aggregate>> {
        &self.full_state_aggregates
    }

    /// Country aggregates over the full range.
    pub fn full_country_aggregates(&self) -> &BTreeMap<String, CountryAggregate> {
        &self.full_country_aggregates
    }
}
