//! Turns the raw TinyDB-style document into a [`GuessTable`].
//!
//! Any malformed record aborts the whole table: callers either get every row
//! or an error naming the first offending document and field.

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::types::{GuessRecord, GuessTable, RawGuessRecord};

/// Field names in document order; positional records use the same order.
const FIELDS: [&str; 6] = ["date", "time", "name", "guess", "casket", "win"];

/// Outcome flag that marks a winning guess. Case-sensitive.
const WIN_FLAG: &str = "yes";

/// Normalize a whole decoded document.
pub fn normalize_document(doc: &Value, table_key: &str) -> Result<GuessTable> {
    let raw = extract_raw_records(doc, table_key)?;
    let rows = raw
        .iter()
        .map(normalize_record)
        .collect::<Result<Vec<_>>>()?;
    Ok(GuessTable::new(rows))
}

/// Pull the raw records out of `doc[table_key]`.
///
/// When every document key is an unsigned integer (TinyDB doc ids) the records
/// are ordered by id, which is submission order. Otherwise document order is kept.
pub fn extract_raw_records(doc: &Value, table_key: &str) -> Result<Vec<RawGuessRecord>> {
    let table = doc
        .get(table_key)
        .ok_or_else(|| AppError::parse("<document>", "table", format!("missing key {table_key:?}")))?
        .as_object()
        .ok_or_else(|| AppError::parse("<document>", "table", "expected an object of records"))?;

    let mut entries: Vec<(&String, &Value)> = table.iter().collect();
    let numeric_ids: Option<Vec<u64>> = entries.iter().map(|(k, _)| k.parse::<u64>().ok()).collect();
    if let Some(ids) = numeric_ids {
        let mut keyed: Vec<(u64, (&String, &Value))> = ids.into_iter().zip(entries).collect();
        keyed.sort_by_key(|(id, _)| *id);
        entries = keyed.into_iter().map(|(_, e)| e).collect();
    }

    entries
        .into_iter()
        .map(|(key, value)| raw_from_value(key, value))
        .collect()
}

/// Check field presence and numeric types of one raw record.
/// Accepts a keyed object or a positional array in [`FIELDS`] order.
pub fn raw_from_value(key: &str, v: &Value) -> Result<RawGuessRecord> {
    if !(v.is_object() || v.is_array()) {
        return Err(AppError::parse(key, "record", "expected an object or array"));
    }

    Ok(RawGuessRecord {
        key: key.to_string(),
        date: string_field(key, v, 0)?,
        time: string_field(key, v, 1)?,
        name: string_field(key, v, 2)?,
        guess: number_field(key, v, 3)?,
        actual: number_field(key, v, 4)?,
        win: field(key, v, 5)?.as_str().map(|s| s.to_string()),
    })
}

fn field<'a>(key: &str, v: &'a Value, idx: usize) -> Result<&'a Value> {
    let found = match v {
        Value::Object(map) => map.get(FIELDS[idx]),
        Value::Array(items) => items.get(idx),
        _ => None,
    };
    found.ok_or_else(|| AppError::parse(key, FIELDS[idx], "missing"))
}

fn string_field(key: &str, v: &Value, idx: usize) -> Result<String> {
    field(key, v, idx)?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::parse(key, FIELDS[idx], "expected a string"))
}

fn number_field(key: &str, v: &Value, idx: usize) -> Result<f64> {
    let value = field(key, v, idx)?;
    value
        .as_f64()
        .ok_or_else(|| AppError::parse(key, FIELDS[idx], format!("not numeric: {value}")))
}

/// Parse the date and time strings and derive the outcome and absolute error.
pub fn normalize_record(raw: &RawGuessRecord) -> Result<GuessRecord> {
    let date = parse_date(&raw.date)
        .ok_or_else(|| AppError::parse(&raw.key, "date", format!("unrecognized date {:?}", raw.date)))?;
    let time = parse_time(&raw.time)
        .ok_or_else(|| AppError::parse(&raw.key, "time", format!("expected HHMMSS, got {:?}", raw.time)))?;
    let win = raw.win.as_deref() == Some(WIN_FLAG);

    Ok(GuessRecord::new(
        date,
        time,
        raw.name.clone(),
        raw.guess,
        raw.actual,
        win,
    ))
}

/// `YYYY-MM-DD`, `YYYY/MM/DD`, `MM/DD/YYYY`, or a date-time starting with `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    match (s.get(..10), s.as_bytes().get(10)) {
        (Some(prefix), Some(b'T' | b' ')) => NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok(),
        _ => None,
    }
}

/// Exactly six ASCII digits, `HHMMSS`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H%M%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(records: Value) -> Value {
        json!({ "_default": records })
    }

    #[test]
    fn keyed_and_positional_records_normalize_alike() {
        let d = doc(json!({
            "1": { "date": "2024-01-01", "time": "093000", "name": "A", "guess": 1000, "casket": 1200, "win": "yes" },
            "2": ["2024-01-01", "094500", "A", 5000, 1200, "no"],
        }));
        let table = normalize_document(&d, "_default").unwrap();
        assert_eq!(table.len(), 2);

        let first = table.get(0).unwrap();
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(first.win);
        assert_eq!(first.absolute_error, 200.0);

        let second = table.get(1).unwrap();
        assert!(!second.win);
        assert_eq!(second.absolute_error, 3800.0);
    }

    #[test]
    fn numeric_doc_ids_sort_chronologically() {
        let d = doc(json!({
            "10": ["2024-01-03", "100000", "C", 1, 1, "no"],
            "2":  ["2024-01-02", "100000", "B", 1, 1, "no"],
            "9":  ["2024-01-02", "110000", "D", 1, 1, "no"],
        }));
        let table = normalize_document(&d, "_default").unwrap();
        let names: Vec<&str> = table.iter().map(|r| r.participant.as_str()).collect();
        assert_eq!(names, vec!["B", "D", "C"]);
    }

    #[test]
    fn non_numeric_keys_keep_document_order() {
        let d = doc(json!({
            "zeta":  ["2024-01-01", "100000", "Z", 1, 1, "no"],
            "alpha": ["2024-01-01", "100000", "A", 1, 1, "no"],
        }));
        let table = normalize_document(&d, "_default").unwrap();
        assert_eq!(table.get(0).unwrap().participant, "Z");
    }

    #[test]
    fn outcome_is_case_sensitive_and_defaults_to_loss() {
        let d = doc(json!({
            "1": ["2024-01-01", "100000", "A", 1, 1, "Yes"],
            "2": ["2024-01-01", "100000", "A", 1, 1, true],
            "3": ["2024-01-01", "100000", "A", 1, 1, "yes"],
        }));
        let table = normalize_document(&d, "_default").unwrap();
        let wins: Vec<bool> = table.iter().map(|r| r.win).collect();
        assert_eq!(wins, vec![false, false, true]);
    }

    #[test]
    fn one_bad_time_aborts_the_table() {
        let d = doc(json!({
            "1": ["2024-01-01", "093000", "A", 1, 1, "yes"],
            "2": ["2024-01-01", "9:30", "B", 1, 1, "no"],
        }));
        match normalize_document(&d, "_default") {
            Err(AppError::Parse { key, field, .. }) => {
                assert_eq!(key, "2");
                assert_eq!(field, "time");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_field_and_non_numeric_guess_are_parse_errors() {
        let missing = doc(json!({ "1": { "date": "2024-01-01", "time": "093000", "name": "A", "guess": 1, "win": "no" } }));
        assert!(matches!(
            normalize_document(&missing, "_default"),
            Err(AppError::Parse { field: "casket", .. })
        ));

        let short = doc(json!({ "1": ["2024-01-01", "093000", "A"] }));
        assert!(matches!(
            normalize_document(&short, "_default"),
            Err(AppError::Parse { field: "guess", .. })
        ));

        let text = doc(json!({ "1": ["2024-01-01", "093000", "A", "lots", 1, "no"] }));
        assert!(matches!(
            normalize_document(&text, "_default"),
            Err(AppError::Parse { field: "guess", .. })
        ));
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        assert!(matches!(
            normalize_document(&json!({ "other": {} }), "_default"),
            Err(AppError::Parse { field: "table", .. })
        ));
    }

    #[test]
    fn date_forms() {
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_date("2024-01-02"), Some(jan2));
        assert_eq!(parse_date("2024/01/02"), Some(jan2));
        assert_eq!(parse_date("01/02/2024"), Some(jan2));
        assert_eq!(parse_date("2024-01-02T10:00:00"), Some(jan2));
        assert_eq!(parse_date("2024-01-02 10:00:00"), Some(jan2));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn time_requires_six_digits() {
        assert_eq!(parse_time("235959"), NaiveTime::from_hms_opt(23, 59, 59));
        assert_eq!(parse_time("93000"), None);
        assert_eq!(parse_time("0930000"), None);
        assert_eq!(parse_time("09:30:"), None);
        assert_eq!(parse_time("250000"), None);
    }
}
