use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, Local, NaiveDate};
use tracing::debug;

use crate::models::{DailyPoint, DreamEntry, Summary, TechniqueCount, WeeklyLucid, WindowStats};

pub const DEFAULT_SERIES_DAYS: usize = 30;
pub const DEFAULT_LUCID_WEEKS: usize = 12;

/// Per-night fields take the max across same-date entries; per-entry fields
/// are summed.
#[derive(Debug, Default)]
struct NightAggregate {
    max_sleep: f64,
    max_wbtb: i32,
    quality_sum: i64,
    entry_count: usize,
    lucid_count: usize,
    lucidity_sum: f64,
}

impl NightAggregate {
    fn add(&mut self, entry: &DreamEntry) {
        self.max_sleep = self.max_sleep.max(entry.sleep_duration_hours);
        self.max_wbtb = self.max_wbtb.max(entry.wbtb_count);
        self.quality_sum += i64::from(entry.quality);
        self.entry_count += 1;
        if entry.lucid {
            self.lucid_count += 1;
            self.lucidity_sum += entry.lucidity;
        }
    }
}

pub fn aggregate(
    entries: &[DreamEntry],
    date_filter: Option<&dyn Fn(NaiveDate) -> bool>,
) -> Summary {
    let mut nights: HashMap<NaiveDate, NightAggregate> = HashMap::new();

    for entry in entries {
        if let Some(filter) = date_filter {
            if !filter(entry.date) {
                continue;
            }
        }
        nights.entry(entry.date).or_default().add(entry);
    }

    let mut summary = Summary {
        unique_dates: nights.len(),
        ..Summary::default()
    };

    for night in nights.values() {
        summary.total_quality += night.quality_sum;
        summary.total_sleep += night.max_sleep;
        summary.total_wbtb += i64::from(night.max_wbtb);
        summary.count += night.entry_count;
        summary.lucid_count += night.lucid_count;
        summary.total_lucidity += night.lucidity_sum;
    }

    summary.avg_quality = ratio(summary.total_quality as f64, summary.count);
    summary.avg_sleep = ratio(summary.total_sleep, summary.unique_dates);
    summary.avg_wbtb = ratio(summary.total_wbtb as f64, summary.unique_dates);
    summary.avg_lucidity = ratio(summary.total_lucidity, summary.lucid_count);

    debug!(
        entries = summary.count,
        nights = summary.unique_dates,
        "aggregated entries"
    );
    summary
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

pub fn compute_stats(entries: &[DreamEntry]) -> WindowStats {
    compute_stats_at(entries, Local::now().date_naive())
}

pub fn compute_stats_at(entries: &[DreamEntry], today: NaiveDate) -> WindowStats {
    let week_from = week_start(today);
    let month_from = month_start(today);

    WindowStats {
        day: aggregate(entries, Some(&|d: NaiveDate| d == today)),
        week: aggregate(entries, Some(&|d: NaiveDate| d >= week_from)),
        month: aggregate(entries, Some(&|d: NaiveDate| d >= month_from)),
        all_time: aggregate(entries, None),
    }
}

/// Average quality and max sleep per date, for the trailing `window_days`
/// dates that have entries. Missing days are not filled in.
pub fn build_daily_series(entries: &[DreamEntry], window_days: usize) -> Vec<DailyPoint> {
    let mut by_date: BTreeMap<NaiveDate, (i64, usize, f64)> = BTreeMap::new();

    for entry in entries {
        let rec = by_date.entry(entry.date).or_insert((0, 0, 0.0));
        rec.0 += i64::from(entry.quality);
        rec.1 += 1;
        rec.2 = rec.2.max(entry.sleep_duration_hours);
    }

    let skip = by_date.len().saturating_sub(window_days);
    by_date
        .into_iter()
        .skip(skip)
        .map(|(date, (quality_sum, count, max_sleep))| DailyPoint {
            date,
            avg_quality: ratio(quality_sum as f64, count),
            avg_sleep: max_sleep,
        })
        .collect()
}

/// Counts every technique occurrence across entries, in order of first use.
pub fn technique_frequency(entries: &[DreamEntry]) -> Vec<TechniqueCount> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<TechniqueCount> = Vec::new();

    for technique in entries.iter().flat_map(|e| e.techniques.iter()) {
        match positions.get(technique.as_str()) {
            Some(&idx) => counts[idx].value += 1,
            None => {
                positions.insert(technique.as_str(), counts.len());
                counts.push(TechniqueCount {
                    name: technique.clone(),
                    value: 1,
                });
            }
        }
    }

    counts
}

/// Lucid vs non-lucid entry counts per Monday-start week, oldest first,
/// limited to the trailing `weeks` weeks that have entries.
pub fn weekly_lucid_counts(entries: &[DreamEntry], weeks: usize) -> Vec<WeeklyLucid> {
    let mut by_week: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();

    for entry in entries {
        let rec = by_week.entry(week_start(entry.date)).or_insert((0, 0));
        if entry.lucid {
            rec.0 += 1;
        } else {
            rec.1 += 1;
        }
    }

    let skip = by_week.len().saturating_sub(weeks);
    by_week
        .into_iter()
        .skip(skip)
        .map(|(week_start, (lucid, non_lucid))| WeeklyLucid {
            week_start,
            lucid,
            non_lucid,
        })
        .collect()
}
