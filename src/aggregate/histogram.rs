use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;

use crate::types::GuessRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateBin {
    pub date: NaiveDate,
    pub count: usize,
    /// Table indices of the records on this date, so a click can be mapped back to rows.
    pub indices: Vec<usize>,
}

/// Guess counts per calendar date, ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateHistogram {
    pub bins: Vec<DateBin>,
}

/// Guess counts per hour of day; `counts[h]` covers `h:00:00..h:59:59`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeHistogram {
    pub counts: Vec<usize>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuessBin {
    /// Inclusive lower edge, a multiple of the bin width.
    pub start: f64,
    /// Exclusive upper edge.
    pub end: f64,
    pub count: usize,
}

/// Fixed-width guess bins anchored at zero. Only non-empty bins are listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuessHistogram {
    pub bin_width: f64,
    pub bins: Vec<GuessBin>,
    pub total: usize,
}

/// `records` pairs each record with its table index.
pub fn date_histogram<'a, I>(records: I) -> DateHistogram
where
    I: IntoIterator<Item = (usize, &'a GuessRecord)>,
{
    let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, r) in records {
        by_date.entry(r.date).or_default().push(idx);
    }
    DateHistogram {
        bins: by_date
            .into_iter()
            .map(|(date, indices)| DateBin {
                date,
                count: indices.len(),
                indices,
            })
            .collect(),
    }
}

pub fn time_histogram<'a, I>(records: I) -> TimeHistogram
where
    I: IntoIterator<Item = &'a GuessRecord>,
{
    let mut counts = vec![0usize; 24];
    let mut total = 0;
    for r in records {
        counts[r.time.hour() as usize] += 1;
        total += 1;
    }
    TimeHistogram { counts, total }
}

/// `bin_width` must be positive.
pub fn guess_histogram<'a, I>(records: I, bin_width: f64) -> GuessHistogram
where
    I: IntoIterator<Item = &'a GuessRecord>,
{
    let mut by_bin: BTreeMap<i64, usize> = BTreeMap::new();
    let mut total = 0;
    for r in records {
        let k = (r.guess / bin_width).floor() as i64;
        *by_bin.entry(k).or_default() += 1;
        total += 1;
    }
    GuessHistogram {
        bin_width,
        bins: by_bin
            .into_iter()
            .map(|(k, count)| GuessBin {
                start: k as f64 * bin_width,
                end: (k + 1) as f64 * bin_width,
                count,
            })
            .collect(),
        total,
    }
}
