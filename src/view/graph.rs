//! Recomputation graph of the dashboard views.
//!
//! ```text
//! TableReplaced ──► Leaderboard, Summary, DateChart, DistributionChart,
//!                   TimeDrilldown, GuessDrilldown
//! PrimarySelection ──► TimeDrilldown
//! DrilldownSelection ──► GuessDrilldown
//! ```

use serde::Serialize;

use crate::aggregate::{
    compute_leaderboard, date_histogram, distribution_chart, guess_histogram, time_histogram,
    DateHistogram, DistributionChart, GuessHistogram, SummaryStats, TimeHistogram,
};
use crate::error::Result;
use crate::types::{GuessRecord, LeaderboardEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewNode {
    Leaderboard,
    Summary,
    DateChart,
    DistributionChart,
    /// Hour-of-day histogram of the primary selection.
    TimeDrilldown,
    /// Guess histogram of the drill-down selection.
    GuessDrilldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    TableReplaced,
    PrimarySelection,
    DrilldownSelection,
}

impl Trigger {
    /// Views that must be recomputed when this trigger fires.
    pub fn dependents(self) -> &'static [ViewNode] {
        match self {
            Trigger::TableReplaced => &[
                ViewNode::Leaderboard,
                ViewNode::Summary,
                ViewNode::DateChart,
                ViewNode::DistributionChart,
                ViewNode::TimeDrilldown,
                ViewNode::GuessDrilldown,
            ],
            Trigger::PrimarySelection => &[ViewNode::TimeDrilldown],
            Trigger::DrilldownSelection => &[ViewNode::GuessDrilldown],
        }
    }
}

/// Chart parameters that do not change between snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub guess_bin_width: f64,
    pub kde_grid_points: usize,
}

/// A freshly computed view, tagged by node.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewValue {
    Leaderboard(Vec<LeaderboardEntry>),
    Summary(SummaryStats),
    DateChart(DateHistogram),
    DistributionChart(DistributionChart),
    TimeDrilldown(TimeHistogram),
    GuessDrilldown(GuessHistogram),
}

/// Compute one view over `records`, which pairs each record with its table index.
pub fn evaluate(
    node: ViewNode,
    records: &[(usize, &GuessRecord)],
    settings: &ViewSettings,
) -> Result<ViewValue> {
    let rows = || records.iter().map(|(_, r)| *r);
    Ok(match node {
        ViewNode::Leaderboard => ViewValue::Leaderboard(compute_leaderboard(rows())?),
        ViewNode::Summary => ViewValue::Summary(SummaryStats::compute(rows())),
        ViewNode::DateChart => ViewValue::DateChart(date_histogram(records.iter().copied())),
        ViewNode::DistributionChart => {
            ViewValue::DistributionChart(distribution_chart(rows(), settings.kde_grid_points))
        }
        ViewNode::TimeDrilldown => ViewValue::TimeDrilldown(time_histogram(rows())),
        ViewNode::GuessDrilldown => {
            ViewValue::GuessDrilldown(guess_histogram(rows(), settings.guess_bin_width))
        }
    })
}

/// Evaluate every dependent of `trigger`, in graph order.
pub fn propagate(
    trigger: Trigger,
    records: &[(usize, &GuessRecord)],
    settings: &ViewSettings,
) -> Result<Vec<ViewValue>> {
    trigger
        .dependents()
        .iter()
        .map(|&node| evaluate(node, records, settings))
        .collect()
}
