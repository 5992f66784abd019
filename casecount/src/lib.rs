//! # casecount
//!
//! In-memory aggregation engine for cumulative epidemic case counts.
//!
//! casecount holds one immutable snapshot of per-region cumulative series
//! (confirmed, deaths, recovered) and answers range queries over it: per-day
//! series and totals at sub-region, country and world level, optionally
//! restricted to one country.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - O(1) range totals: a window is the difference of two cumulative values
//! - One short-lived unit per country on a rayon pool for "all countries" queries
//! - Full-range results and per-day roll-ups precomputed once per refresh
//! - Readers never block on a refresh; the snapshot is swapped, never mutated
//! - Unknown countries are answered with the closest known name
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use casecount::{EngineConfig, QueryParams, SnapshotInput, Store};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new(EngineConfig::default())?;
//! store.refresh(SnapshotInput::load("./snapshot.json")?)?;
//!
//! // Totals per country between two dates
//! let params = QueryParams::between("1/24/20", "1/26/20");
//! for (key, country) in store.country_aggregates(&params)? {
//!     println!("{key} {}: {:?}", country.name, country.aggregate.statistics);
//! }
//!
//! // Same window, one country, per sub-region
//! let china = store.state_aggregates(&params.with_country("China"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Store`]: Top-level handle; owns the current snapshot and refreshes it
//! - [`SnapshotInput`]: Dataset handed over by the ingestion collaborator
//! - [`QueryParams`]: `(from, to, country)`, empty meaning unbounded
//! - [`EngineConfig`]: Worker pool size, delta clamping, country directory
//!
//! ## Modules
//!
//! - [`store`]: Snapshot ownership, refresh, query entry points
//! - [`snapshot`]: Validation and per-refresh precomputation
//! - [`query`]: Query facade and result types
//! - [`aggregate`]: Fan-out aggregation and roll-ups
//! - [`reduce`]: Range reduction over cumulative series
//! - [`dates`]: Date parsing and day index resolution
//! - [`names`]: Country lookup and fuzzy matching
//! - [`series`]: Data model
//! - [`config`]: Engine configuration
//! - [`error`]: Error types

pub mod aggregate;
pub mod config;
pub mod dates;
pub mod error;
pub mod names;
pub mod query;
pub mod reduce;
pub mod series;
pub mod snapshot;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use config::EngineConfig;
pub use error::{CaseCountError, Result};
pub use query::{CountryAggregate, CountrySeries, CountryStates, QueryParams};
pub use series::{Aggregate, DailyStat, Location, RegionSeries, Statistics};
pub use snapshot::SnapshotInput;
pub use store::Store;
