use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EntryError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A journal entry as supplied by an outside producer (CSV or JSON import,
/// the `add` and `edit` commands).
///
/// Only `date` and `quality` are required; everything else defaults when
/// converted into a [`DreamEntry`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DreamEntryRecord {
    pub date: String,
    pub quality: i32,
    #[serde(default)]
    pub sleep_duration_hours: Option<f64>,
    #[serde(default)]
    pub wbtb_count: Option<i32>,
    #[serde(default)]
    pub lucid: Option<bool>,
    #[serde(default)]
    pub lucidity: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub techniques: Option<Vec<String>>,
}

/// A validated entry. Dates are real calendar dates and every optional
/// field has been defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DreamEntry {
    pub id: Option<Uuid>,
    pub date: NaiveDate,
    pub quality: i32,
    pub sleep_duration_hours: f64,
    pub wbtb_count: i32,
    pub lucid: bool,
    pub lucidity: f64,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub techniques: Vec<String>,
}

impl DreamEntry {
    /// Validates a raw record. `index` is the record's position in its batch
    /// and only feeds the error message.
    pub fn from_record(index: usize, record: DreamEntryRecord) -> Result<Self, EntryError> {
        let date = parse_entry_date(index, &record.date)?;

        let sleep_duration_hours = record.sleep_duration_hours.unwrap_or(0.0);
        let wbtb_count = record.wbtb_count.unwrap_or(0);
        let lucidity = record.lucidity.unwrap_or(0.0);

        check_range(index, "quality", f64::from(record.quality), 1.0, 10.0)?;
        check_range(index, "sleepDurationHours", sleep_duration_hours, 0.0, 24.0)?;
        check_range(index, "wbtbCount", f64::from(wbtb_count), 0.0, 10.0)?;
        check_range(index, "lucidity", lucidity, 0.0, 10.0)?;

        Ok(Self {
            id: None,
            date,
            quality: record.quality,
            sleep_duration_hours,
            wbtb_count,
            lucid: record.lucid.unwrap_or(false),
            lucidity,
            notes: record.notes.filter(|n| !n.trim().is_empty()),
            tags: record.tags.unwrap_or_default(),
            techniques: record.techniques.unwrap_or_default(),
        })
    }
}

/// Validates a whole batch. The first bad record rejects the batch.
pub fn validate_records(records: Vec<DreamEntryRecord>) -> Result<Vec<DreamEntry>, EntryError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| DreamEntry::from_record(index, record))
        .collect()
}

/// Reads a JSON array of camelCase records and validates the whole batch.
pub fn entries_from_json(raw: &str) -> anyhow::Result<Vec<DreamEntry>> {
    let records: Vec<DreamEntryRecord> = serde_json::from_str(raw)?;
    Ok(validate_records(records)?)
}

/// Parses a `YYYY-MM-DD` date, rejecting anything that does not format back
/// to the same string (`2024-1-5`, trailing time parts, ...).
pub fn parse_entry_date(index: usize, raw: &str) -> Result<NaiveDate, EntryError> {
    let trimmed = raw.trim();
    let date = NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| {
        if looks_like_date(trimmed) {
            EntryError::InvalidDate {
                index,
                date: raw.to_string(),
            }
        } else {
            EntryError::NonCanonicalDate {
                index,
                date: raw.to_string(),
            }
        }
    })?;

    if date.format(DATE_FORMAT).to_string() != trimmed {
        return Err(EntryError::NonCanonicalDate {
            index,
            date: raw.to_string(),
        });
    }

    Ok(date)
}

fn looks_like_date(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
}

fn check_range(
    index: usize,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), EntryError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EntryError::OutOfRange {
            index,
            field,
            value,
        })
    }
}

/// Time-windowed summary of a set of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub count: usize,
    pub total_quality: i64,
    pub total_sleep: f64,
    pub total_wbtb: i64,
    pub lucid_count: usize,
    pub total_lucidity: f64,
    pub unique_dates: usize,
    pub avg_quality: f64,
    pub avg_sleep: f64,
    pub avg_wbtb: f64,
    pub avg_lucidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub day: Summary,
    pub week: Summary,
    pub month: Summary,
    pub all_time: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub avg_quality: f64,
    pub avg_sleep: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechniqueCount {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyLucid {
    pub week_start: NaiveDate,
    pub lucid: usize,
    pub non_lucid: usize,
}

#[derive(Debug, Clone)]
pub struct Technique {
    pub name: String,
    pub slug: String,
    pub is_default: bool,
}

/// One entry's contribution to the cross-user leaderboard.
#[derive(Debug, Clone)]
pub struct LeaderboardRecord {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub lucid: bool,
    pub sleep_duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    pub username: String,
    pub total_entries: usize,
    pub lucid_count: usize,
    pub total_sleep: f64,
}
