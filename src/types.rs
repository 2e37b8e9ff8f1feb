use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// A guess record as it arrives from the remote document, fields still untyped.
/// Presence and numeric checks have passed; date/time strings are not parsed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGuessRecord {
    /// Document id the record was stored under.
    pub key: String,
    pub date: String,
    /// Six-digit `HHMMSS`.
    pub time: String,
    pub name: String,
    pub guess: f64,
    /// The casket's real value.
    pub actual: f64,
    /// The raw outcome flag when it is a string; `"yes"` marks a win.
    pub win: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalized table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub participant: String,
    pub guess: f64,
    pub actual: f64,
    pub win: bool,
    /// |guess - actual|, never negative.
    pub absolute_error: f64,
}

impl GuessRecord {
    pub fn new(
        date: NaiveDate,
        time: NaiveTime,
        participant: String,
        guess: f64,
        actual: f64,
        win: bool,
    ) -> Self {
        Self {
            date,
            time,
            participant,
            guess,
            actual,
            win,
            absolute_error: (guess - actual).abs(),
        }
    }
}

/// Ordered, immutable set of normalized records. Cloning shares the rows.
/// Records are addressed by index; selections carry these indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuessTable {
    rows: Arc<[GuessRecord]>,
}

impl GuessTable {
    pub fn new(rows: Vec<GuessRecord>) -> Self {
        Self { rows: rows.into() }
    }

    pub fn get(&self, index: usize) -> Option<&GuessRecord> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when both handles point at the same rows (no copy was made).
    #[cfg(test)]
    pub fn shares_rows_with(&self, other: &GuessTable) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GuessRecord> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a GuessTable {
    type Item = &'a GuessRecord;
    type IntoIter = std::slice::Iter<'a, GuessRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// One row of the records view: the table index plus the record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordRow {
    pub index: usize,
    #[serde(flatten)]
    pub record: GuessRecord,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Opaque version marker of the remote dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Git blob shas are 40 chars; the first 12 are plenty for logs.
        let short = match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        };
        write!(f, "{short}")
    }
}

/// A content identifier paired with the table it describes.
#[derive(Debug, Clone)]
pub struct SnapshotDescriptor {
    pub content_id: ContentId,
    pub table: GuessTable,
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub participant: String,
    pub guesses_made: usize,
    pub wins: usize,
    pub closest_win_error: f64,
    /// guesses_made / wins.
    pub win_rate: f64,
}
