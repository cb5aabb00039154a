use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use clap::ValueEnum;

use crate::models::{DreamEntry, DreamEntryRecord};

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub lucid_only: bool,
    pub technique: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &DreamEntry) -> bool {
        if self.lucid_only && !entry.lucid {
            return false;
        }
        if let Some(needle) = non_empty(&self.technique) {
            if !any_contains(&entry.techniques, &needle) {
                return false;
            }
        }
        if let Some(needle) = non_empty(&self.tag) {
            if !any_contains(&entry.tags, &needle) {
                return false;
            }
        }
        if let Some(needle) = non_empty(&self.search) {
            let mut hay = vec![
                entry.date.to_string(),
                entry.notes.clone().unwrap_or_default(),
            ];
            hay.extend(entry.tags.iter().cloned());
            hay.extend(entry.techniques.iter().cloned());
            if !hay.join(" ").to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, entries: &'a [DreamEntry]) -> Vec<&'a DreamEntry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn any_contains(values: &[String], needle: &str) -> bool {
    values.iter().any(|v| v.to_lowercase().contains(needle))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    #[default]
    Date,
    Quality,
    Sleep,
    Wbtb,
    Lucidity,
    Techniques,
}

impl SortKey {
    pub fn compare(self, a: &DreamEntry, b: &DreamEntry) -> Ordering {
        match self {
            SortKey::Date => a.date.cmp(&b.date),
            SortKey::Quality => a.quality.cmp(&b.quality),
            SortKey::Sleep => a
                .sleep_duration_hours
                .partial_cmp(&b.sleep_duration_hours)
                .unwrap_or(Ordering::Equal),
            SortKey::Wbtb => a.wbtb_count.cmp(&b.wbtb_count),
            SortKey::Lucidity => a
                .lucidity
                .partial_cmp(&b.lucidity)
                .unwrap_or(Ordering::Equal),
            SortKey::Techniques => a.techniques.join(",").cmp(&b.techniques.join(",")),
        }
    }
}

/// Stable sort, so entries that compare equal keep their fetched order.
pub fn sort_entries(entries: &mut [&DreamEntry], key: SortKey, descending: bool) {
    entries.sort_by(|a, b| {
        let ord = key.compare(a, b);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// All entries logged for one night, with the night's sleep and WBTB
/// collapsed to their max.
#[derive(Debug, Clone)]
pub struct NightGroup<'a> {
    pub date: NaiveDate,
    pub entries: Vec<&'a DreamEntry>,
    pub sleep: f64,
    pub wbtb: i32,
}

/// Groups entries by date. Entry order inside a group follows the input.
pub fn group_by_night<'a>(entries: &[&'a DreamEntry], descending: bool) -> Vec<NightGroup<'a>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&'a DreamEntry>> = BTreeMap::new();
    for entry in entries {
        by_date.entry(entry.date).or_default().push(*entry);
    }

    let mut groups: Vec<NightGroup<'a>> = by_date
        .into_iter()
        .map(|(date, list)| NightGroup {
            date,
            sleep: list
                .iter()
                .map(|e| e.sleep_duration_hours)
                .fold(0.0, f64::max),
            wbtb: list.iter().map(|e| e.wbtb_count).max().unwrap_or(0),
            entries: list,
        })
        .collect();

    if descending {
        groups.reverse();
    }
    groups
}

/// Field overrides for editing an existing entry. `None` keeps the stored
/// value.
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    pub date: Option<String>,
    pub quality: Option<i32>,
    pub sleep_duration_hours: Option<f64>,
    pub wbtb_count: Option<i32>,
    pub lucid: Option<bool>,
    pub lucidity: Option<f64>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub techniques: Option<Vec<String>>,
}

impl EntryChanges {
    /// Merges the changes over `current`, producing a raw record that still
    /// has to pass validation. Turning lucid off clears lucidity.
    pub fn apply_to(self, current: &DreamEntry) -> DreamEntryRecord {
        let lucid = self.lucid.unwrap_or(current.lucid);
        let lucidity = if lucid {
            self.lucidity.unwrap_or(current.lucidity)
        } else {
            0.0
        };

        DreamEntryRecord {
            date: self.date.unwrap_or_else(|| current.date.to_string()),
            quality: self.quality.unwrap_or(current.quality),
            sleep_duration_hours: Some(
                self.sleep_duration_hours
                    .unwrap_or(current.sleep_duration_hours),
            ),
            wbtb_count: Some(self.wbtb_count.unwrap_or(current.wbtb_count)),
            lucid: Some(lucid),
            lucidity: Some(lucidity),
            notes: self.notes.or_else(|| current.notes.clone()),
            tags: Some(self.tags.unwrap_or_else(|| current.tags.clone())),
            techniques: Some(
                self.techniques
                    .unwrap_or_else(|| current.techniques.clone()),
            ),
        }
    }
}

/// Prefill values for a new entry on a given night.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NightDefaults {
    pub sleep_duration_hours: f64,
    pub wbtb_count: i32,
    pub techniques: Vec<String>,
}

/// Defaults for `date` taken from entries already logged that night, or
/// `None` when the night has no entries. `entries` are newest first, so the
/// technique list comes from the most recent entry that has one.
pub fn night_defaults(entries: &[DreamEntry], date: NaiveDate) -> Option<NightDefaults> {
    let mut defaults: Option<NightDefaults> = None;

    for entry in entries.iter().filter(|e| e.date == date) {
        let rec = defaults.get_or_insert_with(NightDefaults::default);
        rec.sleep_duration_hours = rec.sleep_duration_hours.max(entry.sleep_duration_hours);
        rec.wbtb_count = rec.wbtb_count.max(entry.wbtb_count);
        if rec.techniques.is_empty() && !entry.techniques.is_empty() {
            rec.techniques = entry.techniques.clone();
        }
    }

    defaults
}

/// Technique list of the newest entry that names any technique.
pub fn most_recent_techniques(entries: &[DreamEntry]) -> Vec<String> {
    entries
        .iter()
        .find(|e| !e.techniques.is_empty())
        .map(|e| e.techniques.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(d: &str, sleep: f64, wbtb: i32) -> DreamEntry {
        DreamEntry {
            id: None,
            date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
            quality: 5,
            sleep_duration_hours: sleep,
            wbtb_count: wbtb,
            lucid: false,
            lucidity: 0.0,
            notes: None,
            tags: Vec::new(),
            techniques: Vec::new(),
        }
    }

    #[test]
    fn groups_collapse_sleep_and_wbtb_to_max() {
        let entries = vec![
            entry("2024-05-02", 6.0, 1),
            entry("2024-05-01", 7.0, 0),
            entry("2024-05-02", 7.5, 0),
        ];
        let refs: Vec<&DreamEntry> = entries.iter().collect();

        let groups = group_by_night(&refs, true);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date.to_string(), "2024-05-02");
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[0].sleep, 7.5);
        assert_eq!(groups[0].wbtb, 1);

        let ascending = group_by_night(&refs, false);
        assert_eq!(ascending[0].date.to_string(), "2024-05-01");
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let mut a = entry("2024-05-01", 7.0, 0);
        a.techniques = vec!["MILD".to_string()];
        a.tags = vec!["Flying".to_string()];
        a.notes = Some("Ocean dream".to_string());
        let mut b = entry("2024-05-02", 7.0, 0);
        b.lucid = true;
        b.lucidity = 5.0;
        let entries = vec![a, b];

        let by_technique = EntryFilter {
            technique: Some("mil".to_string()),
            ..Default::default()
        };
        assert_eq!(by_technique.apply(&entries).len(), 1);

        let by_tag = EntryFilter {
            tag: Some("FLY".to_string()),
            ..Default::default()
        };
        assert_eq!(by_tag.apply(&entries).len(), 1);

        let by_search = EntryFilter {
            search: Some("ocean".to_string()),
            ..Default::default()
        };
        assert_eq!(by_search.apply(&entries).len(), 1);

        let by_date = EntryFilter {
            search: Some("2024-05-02".to_string()),
            ..Default::default()
        };
        assert_eq!(by_date.apply(&entries).len(), 1);

        let lucid_only = EntryFilter {
            lucid_only: true,
            ..Default::default()
        };
        assert_eq!(lucid_only.apply(&entries)[0].date.to_string(), "2024-05-02");

        let blank = EntryFilter {
            technique: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.apply(&entries).len(), 2);
    }

    fn sorted_dates(entries: &[DreamEntry], key: SortKey, descending: bool) -> Vec<String> {
        let mut refs: Vec<&DreamEntry> = entries.iter().collect();
        sort_entries(&mut refs, key, descending);
        refs.iter().map(|e| e.date.to_string()).collect()
    }

    fn sortable() -> Vec<DreamEntry> {
        let mut a = entry("2024-05-02", 6.0, 2);
        a.quality = 9;
        a.lucidity = 3.0;
        a.techniques = vec!["WILD".to_string()];
        let mut b = entry("2024-05-03", 8.0, 0);
        b.quality = 2;
        b.lucidity = 7.5;
        b.techniques = vec!["MILD".to_string(), "WBTB".to_string()];
        let mut c = entry("2024-05-01", 7.0, 1);
        c.quality = 5;
        c.lucidity = 0.0;
        c.techniques = vec!["MILD".to_string()];
        vec![a, b, c]
    }

    #[test]
    fn sorts_by_date() {
        let entries = sortable();
        assert_eq!(
            sorted_dates(&entries, SortKey::Date, false),
            ["2024-05-01", "2024-05-02", "2024-05-03"]
        );
        assert_eq!(
            sorted_dates(&entries, SortKey::Date, true),
            ["2024-05-03", "2024-05-02", "2024-05-01"]
        );
    }

    #[test]
    fn sorts_by_quality() {
        assert_eq!(
            sorted_dates(&sortable(), SortKey::Quality, false),
            ["2024-05-03", "2024-05-01", "2024-05-02"]
        );
    }

    #[test]
    fn sorts_by_sleep() {
        assert_eq!(
            sorted_dates(&sortable(), SortKey::Sleep, true),
            ["2024-05-03", "2024-05-01", "2024-05-02"]
        );
    }

    #[test]
    fn sorts_by_wbtb() {
        assert_eq!(
            sorted_dates(&sortable(), SortKey::Wbtb, false),
            ["2024-05-03", "2024-05-01", "2024-05-02"]
        );
    }

    #[test]
    fn sorts_by_lucidity() {
        assert_eq!(
            sorted_dates(&sortable(), SortKey::Lucidity, true),
            ["2024-05-03", "2024-05-02", "2024-05-01"]
        );
    }

    #[test]
    fn sorts_by_joined_techniques() {
        // "MILD" < "MILD,WBTB" < "WILD"
        assert_eq!(
            sorted_dates(&sortable(), SortKey::Techniques, false),
            ["2024-05-01", "2024-05-03", "2024-05-02"]
        );
    }

    #[test]
    fn sorting_before_grouping_orders_entries_within_a_night() {
        let mut low = entry("2024-05-01", 7.0, 0);
        low.quality = 3;
        let mut high = entry("2024-05-01", 7.0, 0);
        high.quality = 9;
        let entries = vec![low, high];

        let mut refs: Vec<&DreamEntry> = entries.iter().collect();
        sort_entries(&mut refs, SortKey::Quality, true);
        let groups = group_by_night(&refs, true);
        assert_eq!(groups[0].entries[0].quality, 9);
        assert_eq!(groups[0].entries[1].quality, 3);
    }

    #[test]
    fn changes_overlay_the_stored_entry() {
        let mut current = entry("2024-05-01", 7.0, 1);
        current.lucid = true;
        current.lucidity = 6.0;
        current.techniques = vec!["MILD".to_string()];

        let changes = EntryChanges {
            quality: Some(9),
            sleep_duration_hours: Some(8.5),
            ..Default::default()
        };
        let edited = DreamEntry::from_record(0, changes.apply_to(&current)).unwrap();
        assert_eq!(edited.date, current.date);
        assert_eq!(edited.quality, 9);
        assert_eq!(edited.sleep_duration_hours, 8.5);
        assert_eq!(edited.wbtb_count, 1);
        assert_eq!(edited.lucidity, 6.0);
        assert_eq!(edited.techniques, vec!["MILD".to_string()]);
    }

    #[test]
    fn clearing_lucid_resets_lucidity() {
        let mut current = entry("2024-05-01", 7.0, 1);
        current.lucid = true;
        current.lucidity = 6.0;

        let changes = EntryChanges {
            lucid: Some(false),
            ..Default::default()
        };
        let edited = DreamEntry::from_record(0, changes.apply_to(&current)).unwrap();
        assert!(!edited.lucid);
        assert_eq!(edited.lucidity, 0.0);
    }

    #[test]
    fn edited_values_are_validated() {
        let current = entry("2024-05-01", 7.0, 1);

        let bad_quality = EntryChanges {
            quality: Some(11),
            ..Default::default()
        };
        assert!(DreamEntry::from_record(0, bad_quality.apply_to(&current)).is_err());

        let bad_date = EntryChanges {
            date: Some("2024-5-1".to_string()),
            ..Default::default()
        };
        assert!(DreamEntry::from_record(0, bad_date.apply_to(&current)).is_err());
    }

    #[test]
    fn night_defaults_use_newest_technique_list() {
        let mut newest = entry("2024-05-01", 6.0, 2);
        newest.techniques = vec!["WILD".to_string()];
        let mut older = entry("2024-05-01", 8.0, 0);
        older.techniques = vec!["MILD".to_string()];
        let entries = vec![entry("2024-05-01", 5.0, 0), newest, older];

        let defaults = night_defaults(&entries, entries[0].date).unwrap();
        assert_eq!(defaults.sleep_duration_hours, 8.0);
        assert_eq!(defaults.wbtb_count, 2);
        assert_eq!(defaults.techniques, vec!["WILD".to_string()]);

        let other = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(night_defaults(&entries, other).is_none());
        assert_eq!(most_recent_techniques(&entries), vec!["WILD".to_string()]);
    }
}
