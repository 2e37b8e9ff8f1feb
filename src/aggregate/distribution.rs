use std::f64::consts::PI;

use serde::Serialize;

use super::{percentile_sorted, sample_std};
use crate::config::winsor;
use crate::types::GuessRecord;

/// Guess vs casket-value densities on one shared grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionChart {
    pub grid: Vec<f64>,
    /// None when the clamped guesses have fewer than two values or no spread.
    pub guess_density: Option<Vec<f64>>,
    pub actual_density: Option<Vec<f64>>,
    /// (P2.5, P97.5) of the raw guesses; the clamp bounds.
    pub guess_bounds: Option<(f64, f64)>,
    /// How many guesses were moved onto a bound.
    pub guesses_clamped: usize,
}

/// Clamp values below the `lower_pct` percentile up to it and values above the
/// `upper_pct` percentile down to it. Order and count are preserved.
/// Returns the clamped values and the bounds; bounds are None for empty input.
pub fn winsorize(values: &[f64], lower_pct: f64, upper_pct: f64) -> (Vec<f64>, Option<(f64, f64)>) {
    if values.is_empty() {
        return (Vec::new(), None);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let lo = percentile_sorted(&sorted, lower_pct);
    let hi = percentile_sorted(&sorted, upper_pct);
    let clamped = values.iter().map(|v| v.clamp(lo, hi)).collect();
    (clamped, Some((lo, hi)))
}

/// Gaussian kernel density estimate with Scott's rule bandwidth, evaluated at `grid`.
pub fn gaussian_kde(samples: &[f64], grid: &[f64]) -> Option<Vec<f64>> {
    let std = sample_std(samples)?;
    if !(std > 0.0) {
        return None;
    }
    let n = samples.len() as f64;
    let bandwidth = std * n.powf(-0.2);
    let norm = 1.0 / (n * bandwidth * (2.0 * PI).sqrt());

    Some(
        grid.iter()
            .map(|&x| {
                let sum: f64 = samples
                    .iter()
                    .map(|&xi| {
                        let z = (x - xi) / bandwidth;
                        (-0.5 * z * z).exp()
                    })
                    .sum();
                sum * norm
            })
            .collect(),
    )
}

fn linspace(lo: f64, hi: f64, points: usize) -> Vec<f64> {
    if points < 2 || lo == hi {
        return vec![lo];
    }
    let step = (hi - lo) / (points - 1) as f64;
    let mut grid: Vec<f64> = (0..points).map(|i| lo + step * i as f64).collect();
    grid[points - 1] = hi;
    grid
}

/// Build the guess-vs-actual distribution chart. Guesses are winsorized first;
/// actual values are used as-is.
pub fn distribution_chart<'a, I>(records: I, grid_points: usize) -> DistributionChart
where
    I: IntoIterator<Item = &'a GuessRecord>,
{
    let (guesses, actuals): (Vec<f64>, Vec<f64>) =
        records.into_iter().map(|r| (r.guess, r.actual)).unzip();

    let (clamped, guess_bounds) = winsorize(&guesses, winsor::LOWER_PCT, winsor::UPPER_PCT);
    let guesses_clamped = guesses
        .iter()
        .zip(&clamped)
        .filter(|(raw, c)| raw != c)
        .count();

    let (lo, hi) = clamped
        .iter()
        .chain(&actuals)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return DistributionChart::default();
    }

    let grid = linspace(lo, hi, grid_points);
    DistributionChart {
        guess_density: gaussian_kde(&clamped, &grid),
        actual_density: gaussian_kde(&actuals, &grid),
        grid,
        guess_bounds,
        guesses_clamped,
    }
}
