use std::collections::HashSet;

use serde::Serialize;

use super::{mean, median, sample_std};
use crate::types::GuessRecord;

/// Display statistics for the actual-value and guess-value series.
/// Computed the same way for the full table and for a selection.
///
/// Every guess on a casket repeats its value, so the actual-value statistics
/// count each distinct casket value once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub actual_distinct: usize,
    pub actual_mean: Option<f64>,
    pub actual_median: Option<f64>,
    pub actual_std: Option<f64>,
    pub guess_count: usize,
    pub guess_mean: Option<f64>,
    pub guess_median: Option<f64>,
    pub guess_std: Option<f64>,
}

impl SummaryStats {
    pub fn compute<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a GuessRecord>,
    {
        let mut actuals = Vec::new();
        let mut guesses = Vec::new();
        let mut seen = HashSet::new();
        for r in records {
            if seen.insert(r.actual.to_bits()) {
                actuals.push(r.actual);
            }
            guesses.push(r.guess);
        }

        Self {
            actual_distinct: actuals.len(),
            actual_mean: mean(&actuals),
            actual_median: median(&actuals),
            actual_std: sample_std(&actuals),
            guess_count: guesses.len(),
            guess_mean: mean(&guesses),
            guess_median: median(&guesses),
            guess_std: sample_std(&guesses),
        }
    }

    /// Text block describing the casket values.
    pub fn actual_text(&self) -> String {
        format!(
            "Caskets opened: {}\nMean casket value: {}\nMedian casket value: {}\nStd. dev. of casket value: {}",
            self.actual_distinct,
            fmt_stat(self.actual_mean),
            fmt_stat(self.actual_median),
            fmt_stat(self.actual_std),
        )
    }

    /// Text block describing the guesses.
    pub fn guess_text(&self) -> String {
        format!(
            "Guesses made: {}\nMean guess: {}\nMedian guess: {}\nStd. dev. of guesses: {}",
            self.guess_count,
            fmt_stat(self.guess_mean),
            fmt_stat(self.guess_median),
            fmt_stat(self.guess_std),
        )
    }
}

fn fmt_stat(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.0}")).unwrap_or_else(|| "n/a".to_string())
}
