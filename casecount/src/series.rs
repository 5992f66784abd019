//! Data model for regional case-count time series.
//!
//! This module holds the pure data types the rest of the engine operates on.
//! A [`RegionSeries`] is one (country, sub-region) pair with its cumulative
//! per-day [`DailyStat`] sequence; a [`CountryBucket`] groups the regions of
//! one country; an [`Aggregate`] is the collapsed output of a range reduction.
//!
//! # Overview
//!
//! ```text
//! CountryBucket "China"
//! ├── "Beijing"  -> RegionSeries { location, population, counts: [DailyStat; N] }
//! ├── "Hubei"    -> RegionSeries { ... }
//! └── "Shanghai" -> RegionSeries { ... }
//!
//! CountryBucket "Singapore"
//! └── ""         -> RegionSeries { ... }   <- the country itself
//! ```
//!
//! Counts are cumulative: each [`DailyStat`] holds the running total since
//! tracking began, not the day's increment.

use std::collections::HashMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

/// Sub-region key representing the country as a whole.
pub const WHOLE_COUNTRY: &str = "";

/// A confirmed/deaths/recovered triple.
///
/// Used both for cumulative values on a given day and for the deltas
/// produced by range reductions. Counters are signed because a reduction
/// over a non-monotonic source series can go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statistics {
    /// Confirmed cases.
    pub confirmed: i64,
    /// Deaths.
    pub deaths: i64,
    /// Recovered cases.
    pub recovered: i64,
}

impl Statistics {
    /// Creates a new triple.
    pub const fn new(confirmed: i64, deaths: i64, recovered: i64) -> Self {
        Self {
            confirmed,
            deaths,
            recovered,
        }
    }

    /// The all-zero triple.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Returns `true` if any counter is negative.
    pub fn has_negative(&self) -> bool {
        self.confirmed < 0 || self.deaths < 0 || self.recovered < 0
    }

    /// Returns a copy with every negative counter replaced by zero.
    #[must_use]
    pub fn clamp_non_negative(self) -> Self {
        Self {
            confirmed: self.confirmed.max(0),
            deaths: self.deaths.max(0),
            recovered: self.recovered.max(0),
        }
    }
}

impl Add for Statistics {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            confirmed: self.confirmed + rhs.confirmed,
            deaths: self.deaths + rhs.deaths,
            recovered: self.recovered + rhs.recovered,
        }
    }
}

impl AddAssign for Statistics {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Statistics {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            confirmed: self.confirmed - rhs.confirmed,
            deaths: self.deaths - rhs.deaths,
            recovered: self.recovered - rhs.recovered,
        }
    }
}

impl Sum for Statistics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// Cumulative statistics for one calendar day.
///
/// `date` is the canonical token used by the source header (e.g. `"1/22/20"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    /// Canonical date token.
    #[serde(rename = "Date")]
    pub date: String,
    /// Cumulative counters as of this day.
    #[serde(flatten)]
    pub statistics: Statistics,
}

impl DailyStat {
    /// Creates a new daily record.
    pub fn new(date: impl Into<String>, confirmed: i64, deaths: i64, recovered: i64) -> Self {
        Self {
            date: date.into(),
            statistics: Statistics::new(confirmed, deaths, recovered),
        }
    }
}

/// Geographic location tag of a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub long: f64,
}

impl Location {
    /// Creates a new location.
    pub const fn new(lat: f64, long: f64) -> Self {
        Self { lat, long }
    }
}

/// Time series for one (country, sub-region) pair.
///
/// `counts` covers the snapshot's full date range, one entry per calendar
/// day with no gaps; index 0 is the snapshot's first date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegionSeries {
    /// Location tag, absent when the source reports none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Population; zero when unknown.
    #[serde(default)]
    pub population: u64,
    /// Cumulative per-day statistics.
    pub counts: Vec<DailyStat>,
}

impl RegionSeries {
    /// Creates a new region series.
    pub fn new(location: Option<Location>, population: u64, counts: Vec<DailyStat>) -> Self {
        Self {
            location,
            population,
            counts,
        }
    }

    /// Number of days covered.
    pub fn day_count(&self) -> usize {
        self.counts.len()
    }

    /// Whether no counter ever decreases from one day to the next.
    pub fn is_monotonic(&self) -> bool {
        self.counts
            .windows(2)
            .all(|pair| !(pair[1].statistics - pair[0].statistics).has_negative())
    }
}

/// All regions belonging to one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountryBucket {
    /// Display name of the country.
    pub name: String,
    /// Regions keyed by sub-region name; [`WHOLE_COUNTRY`] is the country itself.
    pub regions: HashMap<String, RegionSeries>,
}

impl CountryBucket {
    /// Creates an empty bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regions: HashMap::new(),
        }
    }

    /// Adds a region, builder style.
    #[must_use]
    pub fn with_region(mut self, key: impl Into<String>, series: RegionSeries) -> Self {
        self.regions.insert(key.into(), series);
        self
    }

    /// The whole-country entry, if present.
    pub fn whole_country(&self) -> Option<&RegionSeries> {
        self.regions.get(WHOLE_COUNTRY)
    }
}

/// A collapsed statistics triple with its location and population.
///
/// Produced by range reductions and roll-ups; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Aggregate {
    /// Location tag, absent when no contributing region reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Population; zero when unknown.
    #[serde(default)]
    pub population: u64,
    /// The reduced statistics.
    #[serde(flatten)]
    pub statistics: Statistics,
}

impl Aggregate {
    /// Creates a new aggregate.
    pub const fn new(location: Option<Location>, population: u64, statistics: Statistics) -> Self {
        Self {
            location,
            population,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_arithmetic() {
        let a = Statistics::new(7, 5, 1);
        let b = Statistics::new(2, 1, 1);
        assert_eq!(a - b, Statistics::new(5, 4, 0));
        assert_eq!(a + b, Statistics::new(9, 6, 2));

        let total: Statistics = [a, b, Statistics::ZERO].into_iter().sum();
        assert_eq!(total, Statistics::new(9, 6, 2));
    }

    #[test]
    fn test_statistics_clamp() {
        let delta = Statistics::new(-3, 4, -1);
        assert!(delta.has_negative());
        assert_eq!(delta.clamp_non_negative(), Statistics::new(0, 4, 0));
        assert!(!delta.clamp_non_negative().has_negative());
    }

    #[test]
    fn test_region_monotonic() {
        let mut series = RegionSeries::new(
            None,
            0,
            vec![DailyStat::new("1/22/20", 1, 0, 0), DailyStat::new("1/23/20", 3, 2, 1)],
        );
        assert_eq!(series.day_count(), 2);
        assert!(series.is_monotonic());
        assert!(RegionSeries::new(None, 0, vec![]).is_monotonic());

        series.counts.push(DailyStat::new("1/24/20", 3, 1, 1));
        assert!(!series.is_monotonic());
    }

    #[test]
    fn test_daily_stat_serializes_flat() {
        let day = DailyStat::new("1/22/20", 50, 10, 2);
        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Date": "1/22/20", "Confirmed": 50, "Deaths": 10, "Recovered": 2})
        );
    }

    #[test]
    fn test_whole_country_lookup() {
        let bucket = CountryBucket::new("Singapore")
            .with_region(WHOLE_COUNTRY, RegionSeries::new(None, 5_700_000, vec![]));
        assert_eq!(bucket.whole_country().map(|r| r.population), Some(5_700_000));
        assert!(CountryBucket::new("China").whole_country().is_none());
    }
}
