//! Range reduction over cumulative series.
//!
//! Because stored counts are cumulative, the total over a window of days is a
//! prefix-sum difference: the value on the last day of the window minus the
//! value on the day just before it starts. That makes every reduction O(1)
//! regardless of window width.

use crate::series::{DailyStat, Statistics};

/// How negative deltas are treated.
///
/// A well-formed source series never decreases, so deltas are never
/// negative. Corrections in the source data can break that; by default the
/// resulting negative values are passed through as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReduceMode {
    /// Report the raw difference, negative or not.
    #[default]
    PassThrough,
    /// Replace negative counters with zero.
    ClampNegative,
}

/// Reduces `counts[from..=to]` to a single delta.
///
/// - A window that misses the series entirely (`from >= len` or `to < 0`)
///   yields zero.
/// - `to` is clamped to the last index.
/// - The baseline is the cumulative value at `from - 1`, or zero when
///   `from <= 0`.
pub fn reduce_range(counts: &[DailyStat], from: i64, to: i64, mode: ReduceMode) -> Statistics {
    let len = i64::try_from(counts.len()).unwrap_or(i64::MAX);
    if from >= len || to < 0 {
        return Statistics::ZERO;
    }

    let to = to.min(len - 1);
    let baseline = if from > 0 {
        stat_at(counts, from - 1)
    } else {
        Statistics::ZERO
    };

    let delta = stat_at(counts, to) - baseline;
    match mode {
        ReduceMode::PassThrough => delta,
        ReduceMode::ClampNegative => delta.clamp_non_negative(),
    }
}

/// Returns the sub-slice `counts[from..=to]`, clamped to the series.
///
/// An empty slice is returned when the window misses the series.
pub fn slice_range(counts: &[DailyStat], from: i64, to: i64) -> &[DailyStat] {
    let start = usize::try_from(from.max(0)).unwrap_or(usize::MAX);
    let Ok(end) = usize::try_from(to) else {
        return &[];
    };
    let end = end.min(counts.len().saturating_sub(1));
    if start >= counts.len() || start > end {
        return &[];
    }
    &counts[start..=end]
}

#[inline]
fn stat_at(counts: &[DailyStat], index: i64) -> Statistics {
    // Callers have already bounded index to 0..len
    usize::try_from(index)
        .ok()
        .and_then(|i| counts.get(i))
        .map(|day| day.statistics)
        .unwrap_or_default()
}
