//! Error types for the casecount aggregation engine.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all casecount operations.
///
/// Every failure the engine can report is returned as a value; none of them
/// is fatal to the process. Callers map them onto whatever response their
/// surface needs (HTTP status, CLI exit code, ...).
#[derive(Error, Debug)]
pub enum CaseCountError {
    /// Error answering a query (read path).
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Error building a snapshot from collaborator input (refresh path).
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Error loading or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur while answering a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The resolved start of the range lies after its resolved end.
    #[error("from date {from} cannot be after to date {to}")]
    InvalidRange {
        /// The `from` date as supplied by the caller.
        from: String,
        /// The `to` date as supplied by the caller.
        to: String,
    },

    /// A non-empty country filter matched nothing in the snapshot.
    #[error(
        "country {country} not found{}",
        suggestion.as_ref().map(|s| format!(", did you mean: {s}?")).unwrap_or_default()
    )]
    CountryNotFound {
        /// The country filter as supplied by the caller.
        country: String,
        /// The closest known country name, if any country is loaded.
        suggestion: Option<String>,
    },

    /// No snapshot has been loaded yet.
    #[error("no case count data has been loaded")]
    NoSnapshot,

    /// A date could not be parsed by any accepted layout.
    #[error(
        "date format of '{input}' is not recognised, please use either YYYY-MM-DD, YYYY/MM/DD, MM-DD-YY or MM/DD/YY"
    )]
    UnrecognisedDate {
        /// The rejected input.
        input: String,
    },
}

/// Errors that can occur while building a snapshot.
///
/// When a refresh fails with one of these, the previously loaded snapshot
/// stays in service.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The last date of the dataset precedes its first date.
    #[error("invalid date bounds: first date {first} is after last date {last}")]
    InvalidDateBounds {
        /// First date of the dataset.
        first: String,
        /// Last date of the dataset.
        last: String,
    },

    /// A region's series length differs from the dataset's day count.
    #[error("series for {country}/{region:?} has {found} days, expected {expected}")]
    RaggedSeries {
        /// Country key of the offending region.
        country: String,
        /// Sub-region key of the offending region.
        region: String,
        /// Day count implied by the date bounds.
        expected: usize,
        /// Day count actually present.
        found: usize,
    },

    /// A country bucket carries no regions at all.
    #[error("country {country} has no regions")]
    EmptyCountry {
        /// The empty country's key.
        country: String,
    },

    /// The collaborator failed to produce a dataset.
    #[error("failed to load source data: {reason}")]
    Source {
        /// Description of the failure.
        reason: String,
    },

    /// A snapshot file could not be read.
    #[error("failed to read snapshot '{}': {source}", path.display())]
    Read {
        /// The snapshot file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A snapshot file could not be parsed.
    #[error("failed to parse snapshot '{}': {source}", path.display())]
    Parse {
        /// The snapshot file path.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of what is invalid.
        reason: String,
    },

    /// The fan-out worker pool could not be built.
    #[error("failed to build worker pool: {source}")]
    WorkerPool {
        /// The underlying rayon error.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Type alias for `Result<T, CaseCountError>`.
pub type Result<T> = std::result::Result<T, CaseCountError>;
