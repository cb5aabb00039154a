use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    entries_from_json, validate_records, DreamEntry, DreamEntryRecord, LeaderboardRecord, Technique,
};
use crate::techniques;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("migrations applied");
    Ok(())
}

pub async fn ensure_user(pool: &PgPool, username: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO dream_journal.users (id, username)
        VALUES ($1, $2)
        ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

pub async fn user_id(pool: &PgPool, username: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM dream_journal.users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("unknown user {username:?}, create it with add-user"))?;

    Ok(row.get("id"))
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let luna = ensure_user(pool, "luna").await?;
    let morpheus = ensure_user(pool, "morpheus").await?;

    let entries = vec![
        (
            luna,
            "seed-001",
            "2026-02-02",
            8,
            7.5,
            1,
            true,
            6.0,
            "Flew over a glass city",
            vec!["MILD", "WBTB"],
        ),
        (
            luna,
            "seed-002",
            "2026-02-02",
            5,
            7.0,
            1,
            false,
            0.0,
            "Fragment about a train",
            vec!["MILD"],
        ),
        (
            luna,
            "seed-003",
            "2026-02-03",
            6,
            6.0,
            0,
            false,
            0.0,
            "Exam in an old school",
            vec![],
        ),
        (
            morpheus,
            "seed-004",
            "2026-01-30",
            7,
            8.0,
            2,
            true,
            4.0,
            "Noticed the clock change",
            vec!["Reality Checks (RC)"],
        ),
        (
            morpheus,
            "seed-005",
            "2026-01-31",
            4,
            5.5,
            0,
            false,
            0.0,
            "Crowded market",
            vec!["SSILD"],
        ),
    ];

    for (user, source_key, date, quality, sleep, wbtb, lucid, lucidity, note, used) in entries {
        let entry = DreamEntry {
            id: None,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").context("invalid seed date")?,
            quality,
            sleep_duration_hours: sleep,
            wbtb_count: wbtb,
            lucid,
            lucidity,
            notes: Some(note.to_string()),
            tags: Vec::new(),
            techniques: used.into_iter().map(str::to_string).collect(),
        };
        insert_entry(pool, user, &entry, source_key).await?;
    }

    Ok(())
}

/// Inserts an entry; returns false when `source_key` was already imported.
pub async fn insert_entry(
    pool: &PgPool,
    user_id: Uuid,
    entry: &DreamEntry,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO dream_journal.entries
        (id, user_id, entry_date, quality, sleep_duration_hours, wbtb_count,
         lucid, lucidity, notes, tags, techniques, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(entry.id.unwrap_or_else(Uuid::new_v4))
    .bind(user_id)
    .bind(entry.date)
    .bind(entry.quality)
    .bind(entry.sleep_duration_hours)
    .bind(entry.wbtb_count)
    .bind(entry.lucid)
    .bind(entry.lucidity)
    .bind(entry.notes.as_deref())
    .bind(&entry.tags)
    .bind(&entry.techniques)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_entry(pool: &PgPool, user_id: Uuid, entry_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM dream_journal.entries WHERE id = $1 AND user_id = $2")
        .bind(entry_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Replaces the stored values of one of the user's entries. Returns false
/// when no entry with that id belongs to the user.
pub async fn update_entry(
    pool: &PgPool,
    user_id: Uuid,
    entry_id: Uuid,
    entry: &DreamEntry,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE dream_journal.entries
        SET entry_date = $3, quality = $4, sleep_duration_hours = $5, wbtb_count = $6,
            lucid = $7, lucidity = $8, notes = $9, tags = $10, techniques = $11
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(entry_id)
    .bind(user_id)
    .bind(entry.date)
    .bind(entry.quality)
    .bind(entry.sleep_duration_hours)
    .bind(entry.wbtb_count)
    .bind(entry.lucid)
    .bind(entry.lucidity)
    .bind(entry.notes.as_deref())
    .bind(&entry.tags)
    .bind(&entry.techniques)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All of a user's entries, newest night first.
pub async fn fetch_entries(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<DreamEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, entry_date, quality, sleep_duration_hours, wbtb_count,
               lucid, lucidity, notes, tags, techniques
        FROM dream_journal.entries
        WHERE user_id = $1
        ORDER BY entry_date DESC, created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let entries: Vec<DreamEntry> = rows.iter().map(entry_from_row).collect();
    debug!(count = entries.len(), %user_id, "fetched entries");
    Ok(entries)
}

fn entry_from_row(row: &PgRow) -> DreamEntry {
    DreamEntry {
        id: Some(row.get("id")),
        date: row.get("entry_date"),
        quality: row.get("quality"),
        sleep_duration_hours: row.get("sleep_duration_hours"),
        wbtb_count: row.get("wbtb_count"),
        lucid: row.get("lucid"),
        lucidity: row.get("lucidity"),
        notes: row.get("notes"),
        tags: row.get("tags"),
        techniques: row.get("techniques"),
    }
}

/// Imports entries from CSV. Every row is validated before anything is
/// written; one bad row aborts the import.
pub async fn import_csv(
    pool: &PgPool,
    user_id: Uuid,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        date: String,
        quality: i32,
        sleep_duration_hours: Option<f64>,
        wbtb_count: Option<i32>,
        lucid: Option<bool>,
        lucidity: Option<f64>,
        notes: Option<String>,
        tags: Option<String>,
        techniques: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut records = Vec::new();
    let mut source_keys = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        source_keys.push(
            row.source_key
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4())),
        );
        records.push(DreamEntryRecord {
            date: row.date,
            quality: row.quality,
            sleep_duration_hours: row.sleep_duration_hours,
            wbtb_count: row.wbtb_count,
            lucid: row.lucid,
            lucidity: row.lucidity,
            notes: row.notes,
            tags: row.tags.as_deref().map(split_list),
            techniques: row.techniques.as_deref().map(split_list),
        });
    }

    let entries = validate_records(records)
        .with_context(|| format!("rejected {}", csv_path.display()))?;

    let inserted = insert_batch(pool, user_id, &entries, &source_keys).await?;
    info!(inserted, total = entries.len(), "csv import finished");
    Ok(inserted)
}

/// Imports a JSON array of camelCase entry records. Validation is the same
/// all-or-nothing pass as the CSV import.
pub async fn import_json(
    pool: &PgPool,
    user_id: Uuid,
    json_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(json_path)
        .with_context(|| format!("failed to open {}", json_path.display()))?;
    let entries = entries_from_json(&raw)
        .with_context(|| format!("rejected {}", json_path.display()))?;

    let source_keys: Vec<String> = entries
        .iter()
        .map(|_| format!("import-{}", Uuid::new_v4()))
        .collect();

    let inserted = insert_batch(pool, user_id, &entries, &source_keys).await?;
    info!(inserted, total = entries.len(), "json import finished");
    Ok(inserted)
}

async fn insert_batch(
    pool: &PgPool,
    user_id: Uuid,
    entries: &[DreamEntry],
    source_keys: &[String],
) -> anyhow::Result<usize> {
    let mut inserted = 0usize;
    for (entry, source_key) in entries.iter().zip(source_keys.iter()) {
        if insert_entry(pool, user_id, entry, source_key).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The user's technique catalogue, seeding the defaults on first use.
pub async fn fetch_techniques(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Technique>> {
    let count: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM dream_journal.techniques WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?
    .get("n");

    if count == 0 {
        for technique in techniques::default_catalogue() {
            insert_technique(pool, user_id, &technique).await?;
        }
        info!(%user_id, "seeded default techniques");
    }

    let rows = sqlx::query(
        "SELECT name, slug, is_default FROM dream_journal.techniques WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut catalogue: Vec<Technique> = rows
        .iter()
        .map(|row| Technique {
            name: row.get("name"),
            slug: row.get("slug"),
            is_default: row.get("is_default"),
        })
        .collect();
    techniques::sort_catalogue(&mut catalogue);
    Ok(catalogue)
}

pub async fn add_technique(pool: &PgPool, user_id: Uuid, name: &str) -> anyhow::Result<Technique> {
    let existing = fetch_techniques(pool, user_id).await?;
    let technique = techniques::new_technique(name, &existing)?;
    insert_technique(pool, user_id, &technique).await?;
    Ok(technique)
}

async fn insert_technique(
    pool: &PgPool,
    user_id: Uuid,
    technique: &Technique,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO dream_journal.techniques (id, user_id, name, slug, is_default)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&technique.name)
    .bind(&technique.slug)
    .bind(technique.is_default)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_leaderboard_records(pool: &PgPool) -> anyhow::Result<Vec<LeaderboardRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT e.user_id, u.username, e.lucid, e.sleep_duration_hours
        FROM dream_journal.entries e
        LEFT JOIN dream_journal.users u ON u.id = e.user_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| LeaderboardRecord {
            user_id: row.get("user_id"),
            username: row.get("username"),
            lucid: row.get("lucid"),
            sleep_duration_hours: row.get("sleep_duration_hours"),
        })
        .collect())
}
