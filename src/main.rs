use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use uuid::Uuid;

mod config;
mod db;
mod error;
mod journal;
mod leaderboard;
mod models;
mod report;
mod stats;
mod techniques;

use crate::config::AppConfig;
use crate::journal::{EntryChanges, EntryFilter, SortKey};
use crate::models::{DreamEntry, DreamEntryRecord};

#[derive(Parser)]
#[command(name = "dream-journal")]
#[command(about = "Dream journal with nightly statistics and a lucid leaderboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo users and entries
    Seed,
    /// Create a journal user
    AddUser {
        #[arg(long)]
        username: String,
    },
    /// Import entries from a CSV file or a JSON array of records
    #[command(group(
        ArgGroup::new("source")
            .args(["csv", "json"])
            .required(true)
            .multiple(false)
    ))]
    Import {
        #[arg(long)]
        user: String,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Log a single entry
    Add {
        #[arg(long)]
        user: String,
        /// Night of the dream, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        quality: i32,
        /// Defaults to the max already logged for that night
        #[arg(long)]
        sleep: Option<f64>,
        /// Defaults to the max already logged for that night
        #[arg(long)]
        wbtb: Option<i32>,
        #[arg(long)]
        lucid: bool,
        /// Only recorded for lucid entries
        #[arg(long)]
        lucidity: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "technique")]
        techniques: Vec<String>,
    },
    /// Change fields of an existing entry
    Edit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        quality: Option<i32>,
        #[arg(long)]
        sleep: Option<f64>,
        #[arg(long)]
        wbtb: Option<i32>,
        #[arg(long)]
        lucid: Option<bool>,
        #[arg(long)]
        lucidity: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
        /// Replaces all tags when given
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Replaces all techniques when given
        #[arg(long = "technique")]
        techniques: Vec<String>,
    },
    /// Delete an entry
    Delete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: Uuid,
    },
    /// List or extend a user's technique catalogue
    Techniques {
        #[arg(long)]
        user: String,
        #[arg(long)]
        add: Option<String>,
    },
    /// Summaries for today, this week, this month and all time
    Stats {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = stats::DEFAULT_SERIES_DAYS)]
        days: usize,
        #[arg(long)]
        json: bool,
    },
    /// List entries grouped by night
    List {
        #[arg(long)]
        user: String,
        #[arg(long)]
        lucid_only: bool,
        #[arg(long)]
        technique: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        ungrouped: bool,
        #[arg(long, value_enum, default_value_t = SortKey::Date)]
        sort: SortKey,
        #[arg(long)]
        asc: bool,
    },
    /// Rank users by lucid dreams
    Leaderboard {
        #[arg(long, default_value_t = leaderboard::DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = stats::DEFAULT_SERIES_DAYS)]
        days: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::AddUser { username } => {
            let id = db::ensure_user(&pool, &username).await?;
            println!("User {username} ready ({id}).");
        }
        Commands::Import { user, csv, json } => {
            let user_id = db::user_id(&pool, &user).await?;
            let (inserted, path) = match (csv, json) {
                (Some(path), _) => (db::import_csv(&pool, user_id, &path).await?, path),
                (None, Some(path)) => (db::import_json(&pool, user_id, &path).await?, path),
                (None, None) => anyhow::bail!("either --csv or --json is required"),
            };
            println!("Inserted {inserted} entries from {}.", path.display());
        }
        Commands::Add {
            user,
            date,
            quality,
            sleep,
            wbtb,
            lucid,
            lucidity,
            notes,
            tags,
            techniques,
        } => {
            let user_id = db::user_id(&pool, &user).await?;
            let existing = db::fetch_entries(&pool, user_id).await?;
            let date = date.unwrap_or_else(|| Local::now().date_naive().to_string());
            let night = models::parse_entry_date(0, &date)
                .ok()
                .and_then(|d| journal::night_defaults(&existing, d));

            let techniques = if techniques.is_empty() {
                match &night {
                    Some(defaults) if !defaults.techniques.is_empty() => {
                        defaults.techniques.clone()
                    }
                    _ => journal::most_recent_techniques(&existing),
                }
            } else {
                techniques
            };

            let record = DreamEntryRecord {
                date,
                quality,
                sleep_duration_hours: sleep.or(night.as_ref().map(|n| n.sleep_duration_hours)),
                wbtb_count: wbtb.or(night.as_ref().map(|n| n.wbtb_count)),
                lucid: Some(lucid),
                lucidity: lucidity.filter(|_| lucid),
                notes,
                tags: Some(tags),
                techniques: Some(techniques),
            };
            let entry = DreamEntry::from_record(0, record)?;
            let source_key = format!("cli-{}", Uuid::new_v4());
            db::insert_entry(&pool, user_id, &entry, &source_key).await?;
            info!(%user_id, date = %entry.date, "entry logged");
            println!("Logged entry for {}.", entry.date);
        }
        Commands::Edit {
            user,
            id,
            date,
            quality,
            sleep,
            wbtb,
            lucid,
            lucidity,
            notes,
            tags,
            techniques,
        } => {
            let user_id = db::user_id(&pool, &user).await?;
            let existing = db::fetch_entries(&pool, user_id).await?;
            let Some(current) = existing.iter().find(|e| e.id == Some(id)) else {
                println!("No entry {id} for {user}.");
                return Ok(());
            };

            let changes = EntryChanges {
                date,
                quality,
                sleep_duration_hours: sleep,
                wbtb_count: wbtb,
                lucid,
                lucidity,
                notes,
                tags: (!tags.is_empty()).then_some(tags),
                techniques: (!techniques.is_empty()).then_some(techniques),
            };
            let entry = DreamEntry::from_record(0, changes.apply_to(current))?;

            if db::update_entry(&pool, user_id, id, &entry).await? {
                info!(%user_id, entry_id = %id, "entry updated");
                println!("Updated entry {id}.");
            } else {
                println!("No entry {id} for {user}.");
            }
        }
        Commands::Delete { user, id } => {
            let user_id = db::user_id(&pool, &user).await?;
            if db::delete_entry(&pool, user_id, id).await? {
                println!("Deleted entry {id}.");
            } else {
                println!("No entry {id} for {user}.");
            }
        }
        Commands::Techniques { user, add } => {
            let user_id = db::user_id(&pool, &user).await?;
            if let Some(name) = add {
                let technique = db::add_technique(&pool, user_id, &name).await?;
                println!("Added technique {} ({}).", technique.name, technique.slug);
            }
            for technique in db::fetch_techniques(&pool, user_id).await? {
                let marker = if technique.is_default { " (default)" } else { "" };
                println!("- {}{}", technique.name, marker);
            }
        }
        Commands::Stats { user, days, json } => {
            let user_id = db::user_id(&pool, &user).await?;
            let entries = db::fetch_entries(&pool, user_id).await?;
            let windows = stats::compute_stats(&entries);

            if json {
                let payload = serde_json::json!({
                    "stats": windows,
                    "series": stats::build_daily_series(&entries, days),
                    "techniques": stats::technique_frequency(&entries),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            for (label, summary) in [
                ("Today", &windows.day),
                ("This week", &windows.week),
                ("This month", &windows.month),
                ("All time", &windows.all_time),
            ] {
                println!(
                    "{label}: {} entries, {} lucid, sleep {:.1} h ({:.1}/night), WBTB {} ({:.2}/night), quality {:.1}, lucidity {:.1}",
                    summary.count,
                    summary.lucid_count,
                    summary.total_sleep,
                    summary.avg_sleep,
                    summary.total_wbtb,
                    summary.avg_wbtb,
                    summary.avg_quality,
                    summary.avg_lucidity
                );
            }
        }
        Commands::List {
            user,
            lucid_only,
            technique,
            tag,
            search,
            ungrouped,
            sort,
            asc,
        } => {
            let user_id = db::user_id(&pool, &user).await?;
            let entries = db::fetch_entries(&pool, user_id).await?;
            let filter = EntryFilter {
                lucid_only,
                technique,
                tag,
                search,
            };
            let mut matched = filter.apply(&entries);

            if matched.is_empty() {
                println!("No entries match.");
                return Ok(());
            }

            journal::sort_entries(&mut matched, sort, !asc);

            if ungrouped {
                for entry in matched {
                    print_entry(entry, true);
                }
            } else {
                for night in journal::group_by_night(&matched, !asc) {
                    println!("{}  sleep {} h, WBTB {}", night.date, night.sleep, night.wbtb);
                    for entry in night.entries {
                        print_entry(entry, false);
                    }
                }
            }
        }
        Commands::Leaderboard { limit } => {
            let records = db::fetch_leaderboard_records(&pool).await?;
            let rows = leaderboard::rank(&records, limit);

            if rows.is_empty() {
                println!("No entries logged yet.");
                return Ok(());
            }

            println!("Top dreamers by lucid entries:");
            for (place, row) in rows.iter().enumerate() {
                println!(
                    "{}. {} - {} lucid, {} entries, {:.1} h sleep",
                    place + 1,
                    row.username,
                    row.lucid_count,
                    row.total_entries,
                    row.total_sleep
                );
            }
        }
        Commands::Report { user, days, out } => {
            let user_id = db::user_id(&pool, &user).await?;
            let entries = db::fetch_entries(&pool, user_id).await?;
            let report = report::build_report(&user, Local::now().date_naive(), days, &entries);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_entry(entry: &DreamEntry, with_night: bool) {
    let id = entry.id.map(|id| id.to_string()).unwrap_or_default();
    let lucid = if entry.lucid {
        format!("lucid {:.0}", entry.lucidity)
    } else {
        "not lucid".to_string()
    };
    if with_night {
        println!(
            "{} [{}] quality {}, {}, sleep {} h, WBTB {}",
            entry.date, id, entry.quality, lucid, entry.sleep_duration_hours, entry.wbtb_count
        );
    } else {
        println!("  [{}] quality {}, {}", id, entry.quality, lucid);
    }
    if !entry.techniques.is_empty() {
        println!("    techniques: {}", entry.techniques.join(", "));
    }
    if !entry.tags.is_empty() {
        println!("    #{}", entry.tags.join(" #"));
    }
    if let Some(notes) = &entry.notes {
        println!("    {notes}");
    }
}
