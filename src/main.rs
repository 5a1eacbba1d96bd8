//! # Setlist - Song Usage & Rotation Analytics
//!
//! Setlist keeps a worship team's song library honest: it knows when every
//! song was last scheduled, how the team rates it, and which songs dominate
//! the rotation. The binary is a thin CLI over the library crate; all
//! analytics are pure functions over the SQLite-backed ledger.
//!
//! ## Usage
//!
//! ```bash
//! # Create the database
//! setlist init-db
//!
//! # Build the library and record history
//! setlist add-song "Amazing Grace" --artist "John Newton" --duration 260
//! setlist record-usage 1 --service 3 --date 2024-05-05
//!
//! # Reports
//! setlist list
//! setlist top --days 90 --limit 10
//! setlist ratings 1
//! ```
//!
//! Logging is controlled via `RUST_LOG`, e.g. `RUST_LOG=debug setlist top`.

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{CommandFactory, Parser};
use log::info;
use std::collections::HashMap;

use setlist::error::Error;
use setlist::rating::{self, Rating};
use setlist::rotation::{self, RotationConfig};
use setlist::service_order::{self, ServiceSongEntry};
use setlist::song::{Song, SongId};
use setlist::usage::{last_used_dates, Period, UsageRecord};
use setlist::{cli, completion, config, db, ranking};

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let runtime = config::RuntimeConfig::resolve(args.db)?;
    let mut conn = db::connect(&runtime.db_path)
        .with_context(|| format!("Failed to open database at {}", runtime.db_path.display()))?;

    match args.command {
        cli::Command::InitDb { force } => {
            db::init_schema(&conn, force)?;
            println!("Database ready at {}", runtime.db_path.display());
        }
        cli::Command::AddSong {
            title,
            artist,
            key,
            tempo,
            duration,
            tenant,
        } => {
            let song = Song {
                id: 0,
                tenant_id: tenant,
                title,
                artist,
                key,
                tempo_bpm: tempo,
                duration_seconds: duration,
                active: true,
                retired: false,
            };
            let id = db::insert_song(&conn, &song)?;
            println!("Added song {id}: {}", song.title);
        }
        cli::Command::List { tenant, on } => {
            list_library(&conn, tenant, on)?;
        }
        cli::Command::Retire { song, tenant } => {
            db::retire_song(&conn, tenant, song)?;
            println!("Song {song} retired (kept in the library for history).");
        }
        cli::Command::NewService { date, tenant } => {
            let id = db::create_service(&conn, tenant, date)?;
            println!("Created service {id} on {date}");
        }
        cli::Command::AddEntry {
            service,
            song,
            section,
            key,
            duration,
        } => {
            let position = db::add_service_entry(
                &conn,
                &ServiceSongEntry {
                    service_id: service,
                    song_id: song,
                    position: 0,
                    section_tag: section,
                    transposed_key: key,
                    duration_override: duration,
                },
            )?;
            println!("Added song {song} to service {service} at position {position}");
        }
        cli::Command::Reorder {
            service,
            order,
            tenant,
        } => {
            reorder_service(&mut conn, tenant, service, &order)?;
        }
        cli::Command::DeleteService { service } => {
            db::delete_service(&mut conn, service)?;
            println!("Deleted service {service} and its usage history.");
        }
        cli::Command::RecordUsage {
            song,
            service,
            date,
            slot,
            tenant,
        } => {
            db::record_usage(
                &conn,
                &UsageRecord {
                    song_id: song,
                    service_id: service,
                    tenant_id: tenant,
                    used_date: date,
                    slot_index: slot,
                },
            )?;
            info!("Recorded usage of song {song} in service {service}.");
            println!("Recorded: song {song} used in service {service} on {date}");
        }
        cli::Command::Top {
            days,
            limit,
            on,
            json,
            tenant,
        } => {
            top_songs(&conn, tenant, days, limit, on, json)?;
        }
        cli::Command::Rate {
            song,
            member,
            value,
            difficult,
            tenant,
        } => {
            rate_song(&conn, tenant, song, member, value.into(), difficult)?;
        }
        cli::Command::Ratings { song, tenant } => {
            show_ratings(&conn, tenant, song)?;
        }
        cli::Command::SetRotation {
            days,
            recent_fraction,
            tenant,
        } => {
            let current = db::get_rotation_config(&conn, tenant)?;
            let config = RotationConfig {
                repetition_window_days: days,
                recent_fraction: recent_fraction.unwrap_or(current.recent_fraction),
            };
            db::set_rotation_config(&conn, tenant, &config)?;
            println!(
                "Rotation window for tenant {tenant}: {days} days (recent band {} days)",
                config.recent_cutoff_days()
            );
        }
        cli::Command::SetRetirePolicy {
            min_samples,
            down_ratio,
            tenant,
        } => {
            let policy = rating::RetirePolicy {
                min_samples,
                down_ratio,
            };
            db::set_retire_policy(&conn, tenant, &policy)?;
            println!(
                "Auto-retire for tenant {tenant}: {min_samples}+ ratings, {:.0}% down",
                down_ratio * 100.0
            );
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(shell, &mut cmd);
        }
    }

    Ok(())
}

/// Print the library with a rotation badge per song.
fn list_library(conn: &rusqlite::Connection, tenant: i64, on: Option<NaiveDate>) -> Result<()> {
    let today = on.unwrap_or_else(|| Local::now().date_naive());
    let songs = db::list_songs(conn, tenant)?;
    let usage = db::fetch_usage_records(conn, tenant, None, None)?;
    let rotation_config = db::get_rotation_config(conn, tenant)?;
    let last_used = last_used_dates(&usage);

    if songs.is_empty() {
        println!("No songs in the library yet. Add one with `setlist add-song`.");
        return Ok(());
    }

    println!("{:<5} {:<32} {:<20} {:<12} {}", "id", "title", "artist", "last used", "status");
    for song in &songs {
        let last = last_used.get(&song.id).copied();
        let status = if song.retired {
            "retired".to_string()
        } else {
            rotation::classify(last, today, &rotation_config).badge().to_string()
        };
        let last_text = last.map_or_else(|| "-".to_string(), |d| d.to_string());
        println!(
            "{:<5} {:<32} {:<20} {:<12} {}",
            song.id, song.title, song.artist, last_text, status
        );
    }
    Ok(())
}

/// Rank the last `days` days against the preceding period of equal length.
fn top_songs(
    conn: &rusqlite::Connection,
    tenant: i64,
    days: u32,
    limit: usize,
    on: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    // End is exclusive; default covers through today.
    let end = on.unwrap_or_else(|| Local::now().date_naive() + Duration::days(1));
    let current = Period::ending_at(end, days);
    let previous = current.preceding();

    let span = Period {
        start: previous.start,
        end: current.end,
    };
    let usage = db::fetch_usage_records(conn, tenant, None, Some(span))?;
    let songs: HashMap<SongId, Song> = db::list_songs(conn, tenant)?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let ranked = ranking::rank(&usage, &songs, current, previous, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }

    if ranked.is_empty() {
        println!("No usage recorded between {} and {}.", current.start, current.end);
        return Ok(());
    }

    println!("Top songs, {} to {} vs the {days} days before:", current.start, current.end);
    for entry in &ranked {
        let trend = match entry.trend {
            ranking::Trend::New => "new".to_string(),
            ranking::Trend::Up => format!("+{}", entry.delta),
            ranking::Trend::Down => format!("-{}", entry.delta),
            ranking::Trend::Unchanged => "=".to_string(),
        };
        println!(
            "{:>3}. {:<32} {:>3} uses  [{trend}]",
            entry.rank, entry.title, entry.usage_count
        );
    }
    Ok(())
}

/// Upsert a member's rating; repeating the identical rating removes it.
///
/// The toggle is deliberately a CLI policy: the store and the aggregator only
/// ever see the resulting rating set.
fn rate_song(
    conn: &rusqlite::Connection,
    tenant: i64,
    song: i64,
    member: i64,
    value: rating::RatingValue,
    difficult: bool,
) -> Result<()> {
    let existing = db::get_rating(conn, song, member)?;
    if let Some(current) = existing {
        if current.value == value && current.is_difficult == difficult {
            db::delete_rating(conn, song, member)?;
            println!("Removed member {member}'s rating of song {song}.");
            return Ok(());
        }
    }

    db::upsert_rating(
        conn,
        &Rating {
            song_id: song,
            member_id: member,
            tenant_id: tenant,
            value,
            is_difficult: difficult,
        },
    )?;
    println!("Rated song {song} {} for member {member}.", value.as_str());
    Ok(())
}

/// Print a song's rating summary and whether the auto-retire signal fires.
fn show_ratings(conn: &rusqlite::Connection, tenant: i64, song: i64) -> Result<()> {
    let stored = db::get_song(conn, tenant, song)?;
    let ratings = db::fetch_ratings(conn, song)?;
    let summary = rating::aggregate(song, &ratings);
    let policy = db::get_retire_policy(conn, tenant)?;

    println!("{} ({} ratings)", stored.title, summary.total);
    println!("  up: {}  neutral: {}  down: {}", summary.up_count, summary.neutral_count, summary.down_count);
    println!("  flagged difficult: {}", summary.difficult_count);
    if rating::should_auto_retire(&summary, &policy) {
        println!(
            "  auto-retire: YES ({}/{} down, threshold {:.0}%)",
            summary.down_count,
            summary.total,
            policy.down_ratio * 100.0
        );
    } else {
        println!("  auto-retire: no");
    }
    Ok(())
}

/// Validate, apply and persist a reorder; conflicts are reported for retry.
fn reorder_service(
    conn: &mut rusqlite::Connection,
    tenant: i64,
    service: i64,
    order: &[i64],
) -> Result<()> {
    let entries = db::fetch_service_entries(conn, service)?;
    let version = db::service_version(conn, service)?;

    let reordered = service_order::reorder(&entries, order)?;
    match db::persist_reordered_entries(conn, service, &reordered, version) {
        Ok(_) => {}
        Err(Error::Conflict(msg)) => {
            anyhow::bail!("someone else edited service {service} at the same time ({msg}); re-run with the fresh order");
        }
        Err(err) => return Err(err.into()),
    }

    let songs: HashMap<SongId, Song> = db::list_songs(conn, tenant)?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let total = service_order::total_duration(&reordered, &songs);

    println!("Service {service} reordered:");
    for entry in &reordered {
        let title = songs
            .get(&entry.song_id)
            .map_or("(unknown)", |s| s.title.as_str());
        println!("  {}. {title}", entry.position + 1);
    }
    println!("Total planned time: {}", format_duration(total));
    Ok(())
}

/// Seconds as m:ss for report output.
fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
