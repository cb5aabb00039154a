use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{LeaderboardRecord, LeaderboardRow};

pub const DEFAULT_LIMIT: usize = 20;

/// Ranks users by lucid entries, then total entries. Sleep is a plain sum
/// over entries here, not deduplicated per night.
pub fn rank(records: &[LeaderboardRecord], limit: usize) -> Vec<LeaderboardRow> {
    let mut rows: HashMap<Uuid, LeaderboardRow> = HashMap::new();

    for record in records {
        let row = rows.entry(record.user_id).or_insert_with(|| LeaderboardRow {
            user_id: record.user_id,
            username: record
                .username
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            total_entries: 0,
            lucid_count: 0,
            total_sleep: 0.0,
        });

        row.total_entries += 1;
        if record.lucid {
            row.lucid_count += 1;
        }
        row.total_sleep += record.sleep_duration_hours;
    }

    let mut values: Vec<LeaderboardRow> = rows.into_values().collect();
    values.sort_by(|a, b| {
        b.lucid_count
            .cmp(&a.lucid_count)
            .then_with(|| b.total_entries.cmp(&a.total_entries))
            .then_with(|| a.username.cmp(&b.username))
    });
    values.truncate(limit);
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: Uuid, name: Option<&str>, lucid: bool) -> LeaderboardRecord {
        LeaderboardRecord {
            user_id,
            username: name.map(str::to_string),
            lucid,
            sleep_duration_hours: 7.0,
        }
    }

    #[test]
    fn lucid_count_outranks_entry_count() {
        let avery = Uuid::new_v4();
        let jules = Uuid::new_v4();
        let records = vec![
            record(avery, Some("avery"), false),
            record(avery, Some("avery"), false),
            record(avery, Some("avery"), false),
            record(jules, Some("jules"), true),
        ];

        let rows = rank(&records, DEFAULT_LIMIT);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].username, "jules");
        assert_eq!(rows[1].total_entries, 3);
        assert!((rows[1].total_sleep - 21.0).abs() < 1e-9);
    }

    #[test]
    fn ties_break_on_entries_then_name() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let records = vec![
            record(a, Some("zed"), true),
            record(b, Some("amy"), true),
            record(c, None, true),
            record(c, None, false),
        ];

        let rows = rank(&records, DEFAULT_LIMIT);
        assert_eq!(rows[0].username, "Unknown");
        assert_eq!(rows[1].username, "amy");
        assert_eq!(rows[2].username, "zed");
        assert_eq!(rank(&records, 1).len(), 1);
    }
}
