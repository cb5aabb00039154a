use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{DreamEntry, Summary, TechniqueCount};
use crate::stats;

/// Techniques sorted by use, most frequent first. Ties keep first-use order.
pub fn ranked_techniques(entries: &[DreamEntry]) -> Vec<TechniqueCount> {
    let mut counts = stats::technique_frequency(entries);
    counts.sort_by(|a, b| b.value.cmp(&a.value));
    counts
}

fn write_summary(output: &mut String, title: &str, summary: &Summary) {
    let _ = writeln!(output, "### {title}");
    if summary.count == 0 {
        let _ = writeln!(output, "No entries in this window.");
        let _ = writeln!(output);
        return;
    }

    let _ = writeln!(
        output,
        "- {} entries over {} nights, {} lucid",
        summary.count, summary.unique_dates, summary.lucid_count
    );
    let _ = writeln!(
        output,
        "- Sleep {:.1} h total, {:.1} h per night",
        summary.total_sleep, summary.avg_sleep
    );
    let _ = writeln!(
        output,
        "- WBTB {} total, {:.2} per night",
        summary.total_wbtb, summary.avg_wbtb
    );
    let _ = writeln!(
        output,
        "- Avg quality {:.1}, avg lucidity {:.1}",
        summary.avg_quality, summary.avg_lucidity
    );
    let _ = writeln!(output);
}

pub fn build_report(
    username: &str,
    today: NaiveDate,
    series_days: usize,
    entries: &[DreamEntry],
) -> String {
    let windows = stats::compute_stats_at(entries, today);
    let series = stats::build_daily_series(entries, series_days);
    let techniques = ranked_techniques(entries);
    let weeks = stats::weekly_lucid_counts(entries, stats::DEFAULT_LUCID_WEEKS);

    let mut output = String::new();

    let _ = writeln!(output, "# Dream Journal Report");
    let _ = writeln!(output, "Generated for {} on {}", username, today);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output);
    write_summary(&mut output, "Today", &windows.day);
    write_summary(&mut output, "This week", &windows.week);
    write_summary(&mut output, "This month", &windows.month);
    write_summary(&mut output, "All time", &windows.all_time);

    let _ = writeln!(output, "## Last {series_days} Nights");
    if series.is_empty() {
        let _ = writeln!(output, "No entries recorded yet.");
    } else {
        let _ = writeln!(output, "| Date | Avg quality | Sleep (h) |");
        let _ = writeln!(output, "| --- | --- | --- |");
        for point in series.iter() {
            let _ = writeln!(
                output,
                "| {} | {:.1} | {:.1} |",
                point.date, point.avg_quality, point.avg_sleep
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Techniques");
    if techniques.is_empty() {
        let _ = writeln!(output, "No techniques logged.");
    } else {
        for technique in techniques.iter() {
            let _ = writeln!(output, "- {}: {}", technique.name, technique.value);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lucid vs Non-lucid by Week");
    if weeks.is_empty() {
        let _ = writeln!(output, "No entries recorded yet.");
    } else {
        for week in weeks.iter() {
            let _ = writeln!(
                output,
                "- week of {}: {} lucid, {} non-lucid",
                week.week_start, week.lucid, week.non_lucid
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(d: &str, techniques: &[&str]) -> DreamEntry {
        DreamEntry {
            id: None,
            date: NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(),
            quality: 6,
            sleep_duration_hours: 7.0,
            wbtb_count: 1,
            lucid: false,
            lucidity: 0.0,
            notes: None,
            tags: Vec::new(),
            techniques: techniques.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn techniques_rank_by_count() {
        let entries = vec![
            entry("2024-05-01", &["SSILD"]),
            entry("2024-05-02", &["MILD"]),
            entry("2024-05-03", &["MILD"]),
        ];
        let ranked = ranked_techniques(&entries);
        assert_eq!(ranked[0].name, "MILD");
        assert_eq!(ranked[1].name, "SSILD");
    }

    #[test]
    fn report_lists_windows_and_series() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let entries = vec![entry("2024-05-03", &["MILD"]), entry("2024-04-10", &[])];

        let report = build_report("luna", today, 30, &entries);
        assert!(report.contains("Generated for luna on 2024-05-03"));
        assert!(report.contains("### Today\n- 1 entries over 1 nights, 0 lucid"));
        assert!(report.contains("| 2024-04-10 | 6.0 | 7.0 |"));
        assert!(report.contains("- MILD: 1"));
        assert!(report.contains("- week of 2024-04-29: 0 lucid, 1 non-lucid"));
    }

    #[test]
    fn empty_journal_still_renders() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let report = build_report("luna", today, 30, &[]);
        assert!(report.contains("### All time\nNo entries in this window."));
        assert!(report.contains("No techniques logged."));
    }
}
