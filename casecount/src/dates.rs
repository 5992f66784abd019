//! Calendar handling and the date index resolver.
//!
//! Every series in a snapshot is indexed by day offset from the snapshot's
//! first date. [`DateBounds::resolve_indices`] turns a user-supplied
//! `(from, to)` pair into such offsets, clamping to the available window:
//!
//! ```text
//! first                                   last
//!   |-----|-----|-----|-----|-----|-----|
//!   0     1     2     3     4     5     6     <- index
//!         ^from             ^to
//! ```
//!
//! A `from` that is empty, unparseable or not after the first date clamps to
//! index 0; a `to` that is empty, unparseable or not before the last date
//! clamps to the last index. The resolver never reports a reversed range
//! itself; the query facade does that.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, QueryError};

/// Layout of the canonical date token used by the source data (`1/22/20`).
pub const CASES_DATE_FORMAT: &str = "%-m/%-d/%y";

/// Layouts accepted for user-supplied dates, tried in order.
///
/// Two-digit-year layouts come before their four-digit counterparts so that
/// `20-1-22` is not read as the year 20.
const ACCEPTED_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m-%d-%y",
    "%y/%m/%d",
    "%y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%Y-%m-%d",
];

/// Parses a date in any accepted layout.
///
/// Returns `None` for empty or unrecognised input.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
}

/// Formats a date as the canonical source token.
pub fn format_date(date: NaiveDate) -> String {
    date.format(CASES_DATE_FORMAT).to_string()
}

/// Rewrites a user-supplied date into the canonical token.
///
/// Empty input stays empty ("unbounded").
///
/// # Errors
///
/// Returns [`QueryError::UnrecognisedDate`] if no accepted layout matches.
pub fn normalize_date(input: &str) -> Result<String, QueryError> {
    if input.trim().is_empty() {
        return Ok(String::new());
    }
    parse_date(input)
        .map(format_date)
        .ok_or_else(|| QueryError::UnrecognisedDate {
            input: input.to_string(),
        })
}

/// Whole days from `start` to `end`; negative when `end` precedes `start`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    end.signed_duration_since(start).num_days()
}

/// First and last date of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    first: NaiveDate,
    last: NaiveDate,
}

impl DateBounds {
    /// Creates date bounds.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidDateBounds`] if `last` precedes `first`.
    pub fn new(first: NaiveDate, last: NaiveDate) -> Result<Self, IngestError> {
        if last < first {
            return Err(IngestError::InvalidDateBounds {
                first: format_date(first),
                last: format_date(last),
            });
        }
        Ok(Self { first, last })
    }

    /// First day covered.
    pub fn first(&self) -> NaiveDate {
        self.first
    }

    /// Last day covered.
    pub fn last(&self) -> NaiveDate {
        self.last
    }

    /// Number of days covered, both ends inclusive.
    pub fn day_count(&self) -> usize {
        // last >= first is guaranteed by construction
        usize::try_from(days_between(self.first, self.last)).unwrap_or(0) + 1
    }

    /// Index of the last day.
    pub fn last_index(&self) -> i64 {
        days_between(self.first, self.last)
    }

    /// Resolves a `(from, to)` pair into day indices.
    ///
    /// Empty strings mean unbounded. The returned pair may be reversed
    /// (`from > to`) when the literal inputs are, or when both fall on the
    /// same side outside the window; detecting that is the caller's job.
    pub fn resolve_indices(&self, from: &str, to: &str) -> (i64, i64) {
        let mut from_index = 0;
        let mut to_index = self.last_index();
        if from.is_empty() && to.is_empty() {
            return (from_index, to_index);
        }

        if let Some(from_date) = parse_date(from) {
            if from_date > self.first {
                from_index = days_between(self.first, from_date);
            }
        }
        if let Some(to_date) = parse_date(to) {
            if to_date < self.last {
                to_index = days_between(self.first, to_date);
            }
        }
        (from_index, to_index)
    }
}
