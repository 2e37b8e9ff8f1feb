//! Pure aggregations over a [`GuessTable`](crate::types::GuessTable) or a
//! selected subset of its records.

pub mod distribution;
pub mod histogram;
pub mod leaderboard;
pub mod summary;

pub use distribution::{distribution_chart, DistributionChart};
pub use histogram::{date_histogram, guess_histogram, time_histogram, DateHistogram, GuessHistogram, TimeHistogram};
pub use leaderboard::compute_leaderboard;
pub use summary::SummaryStats;

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Sample standard deviation (n - 1 denominator). Needs at least two values.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Percentile `pct` in [0, 100], interpolating linearly between closest ranks.
pub(crate) fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, pct))
}

/// `sorted` must be non-empty and ascending.
pub(crate) fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
