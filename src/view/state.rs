use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::aggregate::{
    DateHistogram, DistributionChart, GuessHistogram, SummaryStats, TimeHistogram,
};
use crate::error::{AppError, Result};
use crate::types::{ContentId, GuessRecord, GuessTable, LeaderboardEntry, RecordRow, SnapshotDescriptor};
use crate::view::graph::{propagate, Trigger, ViewSettings, ViewValue};

// ---------------------------------------------------------------------------
// Snapshot: the table plus every table-level view, published as one unit
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Snapshot {
    pub descriptor: SnapshotDescriptor,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub summary: SummaryStats,
    pub date_chart: DateHistogram,
    pub distribution: DistributionChart,
    pub published_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn table(&self) -> &GuessTable {
        &self.descriptor.table
    }

    pub fn content_id(&self) -> &ContentId {
        &self.descriptor.content_id
    }
}

// ---------------------------------------------------------------------------
// Drill-downs: views scoped to the user's chart selections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Drilldowns {
    /// Primary-chart selection; None means the whole table.
    primary: Option<Vec<usize>>,
    time_chart: TimeHistogram,
    guess_chart: GuessHistogram,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewStatus {
    Empty,
    Loaded {
        content_id: ContentId,
        records: usize,
        published_at: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// Shared dashboard state.
///
/// Lock order is always `drilldowns` then `snapshot`, so a selection handler
/// never pairs a new table with drill-downs computed for the previous one.
pub struct ViewState {
    settings: ViewSettings,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    drilldowns: Mutex<Drilldowns>,
}

impl ViewState {
    pub fn new(settings: ViewSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            snapshot: RwLock::new(None),
            drilldowns: Mutex::new(Drilldowns::default()),
        })
    }

    /// Current snapshot, if any. The lock is released before returning.
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().await.clone()
    }

    pub async fn loaded(&self) -> Result<Arc<Snapshot>> {
        self.current().await.ok_or(AppError::NotLoaded)
    }

    pub async fn status(&self) -> ViewStatus {
        match self.current().await {
            None => ViewStatus::Empty,
            Some(s) => ViewStatus::Loaded {
                content_id: s.content_id().clone(),
                records: s.table().len(),
                published_at: s.published_at,
            },
        }
    }

    /// Replace the table. Every dependent view is computed before anything is
    /// published; on error the previous snapshot stays in place.
    pub async fn publish(&self, descriptor: SnapshotDescriptor) -> Result<Arc<Snapshot>> {
        let indexed: Vec<(usize, &GuessRecord)> = descriptor.table.iter().enumerate().collect();
        let values = propagate(Trigger::TableReplaced, &indexed, &self.settings)?;

        let mut leaderboard = Vec::new();
        let mut summary = SummaryStats::default();
        let mut date_chart = DateHistogram::default();
        let mut distribution = DistributionChart::default();
        let mut time_chart = TimeHistogram::default();
        let mut guess_chart = GuessHistogram::default();
        for value in values {
            match value {
                ViewValue::Leaderboard(v) => leaderboard = v,
                ViewValue::Summary(v) => summary = v,
                ViewValue::DateChart(v) => date_chart = v,
                ViewValue::DistributionChart(v) => distribution = v,
                ViewValue::TimeDrilldown(v) => time_chart = v,
                ViewValue::GuessDrilldown(v) => guess_chart = v,
            }
        }
        drop(indexed);
        if descriptor.table.is_empty() {
            warn!(content_id = %descriptor.content_id, "Publishing an empty table");
        }

        let snapshot = Arc::new(Snapshot {
            descriptor,
            leaderboard,
            summary,
            date_chart,
            distribution,
            published_at: Utc::now(),
        });

        let mut drilldowns = self.drilldowns.lock().await;
        let mut slot = self.snapshot.write().await;
        *slot = Some(Arc::clone(&snapshot));
        *drilldowns = Drilldowns {
            primary: None,
            time_chart,
            guess_chart,
        };
        Ok(snapshot)
    }

    /// Primary-chart point selection: recompute the time-of-day drill-down over
    /// the selected rows. An empty or stale selection leaves the drill-down as it was.
    pub async fn select_primary(
        &self,
        indices: &[usize],
        taken_from: Option<&ContentId>,
    ) -> Result<TimeHistogram> {
        let mut drilldowns = self.drilldowns.lock().await;
        let snapshot = self.current().await.ok_or(AppError::EmptySelection("primary chart"))?;
        ensure_current(&snapshot, taken_from)?;
        let selected = resolve_selection(snapshot.table(), indices, "primary chart")?;

        let rows = indexed_rows(snapshot.table(), &selected);
        for value in propagate(Trigger::PrimarySelection, &rows, &self.settings)? {
            if let ViewValue::TimeDrilldown(chart) = value {
                drilldowns.time_chart = chart;
            }
        }
        debug!(selected = selected.len(), "Primary selection applied");
        drilldowns.primary = Some(selected);
        Ok(drilldowns.time_chart.clone())
    }

    /// Drill-down point selection: recompute the guess histogram over the
    /// selected rows that are also in the primary selection.
    pub async fn select_drilldown(
        &self,
        indices: &[usize],
        taken_from: Option<&ContentId>,
    ) -> Result<GuessHistogram> {
        let mut drilldowns = self.drilldowns.lock().await;
        let snapshot = self.current().await.ok_or(AppError::EmptySelection("drill-down chart"))?;
        ensure_current(&snapshot, taken_from)?;
        let mut selected = resolve_selection(snapshot.table(), indices, "drill-down chart")?;

        if let Some(primary) = &drilldowns.primary {
            let allowed: BTreeSet<usize> = primary.iter().copied().collect();
            selected.retain(|i| allowed.contains(i));
            if selected.is_empty() {
                return Err(AppError::EmptySelection("drill-down chart"));
            }
        }

        let rows = indexed_rows(snapshot.table(), &selected);
        for value in propagate(Trigger::DrilldownSelection, &rows, &self.settings)? {
            if let ViewValue::GuessDrilldown(chart) = value {
                drilldowns.guess_chart = chart;
            }
        }
        debug!(selected = selected.len(), "Drill-down selection applied");
        Ok(drilldowns.guess_chart.clone())
    }

    pub async fn time_drilldown(&self) -> Result<TimeHistogram> {
        self.loaded().await?;
        Ok(self.drilldowns.lock().await.time_chart.clone())
    }

    pub async fn guess_drilldown(&self) -> Result<GuessHistogram> {
        self.loaded().await?;
        Ok(self.drilldowns.lock().await.guess_chart.clone())
    }

    /// The whole table, or the selected rows, in table order.
    pub async fn records(
        &self,
        indices: Option<&[usize]>,
        taken_from: Option<&ContentId>,
    ) -> Result<Vec<RecordRow>> {
        let snapshot = self.loaded().await?;
        ensure_current(&snapshot, taken_from)?;
        let table = snapshot.table();
        let selected = match indices {
            Some(indices) => resolve_selection(table, indices, "records table")?,
            None => (0..table.len()).collect(),
        };
        Ok(indexed_rows(table, &selected)
            .into_iter()
            .map(|(index, record)| RecordRow {
                index,
                record: record.clone(),
            })
            .collect())
    }

    /// Summary statistics over the selected rows.
    pub async fn selection_summary(
        &self,
        indices: &[usize],
        taken_from: Option<&ContentId>,
    ) -> Result<SummaryStats> {
        let snapshot = self.loaded().await?;
        ensure_current(&snapshot, taken_from)?;
        let selected = resolve_selection(snapshot.table(), indices, "summary")?;
        Ok(SummaryStats::compute(
            selected.iter().filter_map(|&i| snapshot.table().get(i)),
        ))
    }
}

/// Row indices only mean something against the snapshot they were taken from.
/// Selections that do not name a snapshot are applied to the current one.
fn ensure_current(snapshot: &Snapshot, taken_from: Option<&ContentId>) -> Result<()> {
    match taken_from {
        Some(id) if id != snapshot.content_id() => Err(AppError::StaleSelection {
            selected: id.0.clone(),
            current: snapshot.content_id().0.clone(),
        }),
        _ => Ok(()),
    }
}

/// Sort and dedupe `indices`, dropping any outside the table.
fn resolve_selection(table: &GuessTable, indices: &[usize], target: &'static str) -> Result<Vec<usize>> {
    let unique: BTreeSet<usize> = indices.iter().copied().collect();
    let (valid, stale): (Vec<usize>, Vec<usize>) = unique.into_iter().partition(|&i| i < table.len());
    if !stale.is_empty() {
        warn!(
            target_view = target,
            dropped = stale.len(),
            table_len = table.len(),
            "Selection referenced rows outside the current table"
        );
    }
    if valid.is_empty() {
        return Err(AppError::EmptySelection(target));
    }
    Ok(valid)
}

fn indexed_rows<'a>(table: &'a GuessTable, indices: &[usize]) -> Vec<(usize, &'a GuessRecord)> {
    indices
        .iter()
        .filter_map(|&i| table.get(i).map(|r| (i, r)))
        .collect()
}
