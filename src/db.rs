//! SQLite store: the reference persistence collaborator.
//!
//! The analytics core is pure; this module owns every read and write. It
//! implements the collaborator contracts the core consumes: fetching usage,
//! ratings and setlist entries, appending usage facts, last-write-wins rating
//! upserts, and the versioned reorder persist with an optimistic conflict
//! check. All queries are tenant-scoped by explicit parameter.

use crate::error::{Error, Result};
use crate::rating::{Rating, RatingValue, RetirePolicy};
use crate::rotation::RotationConfig;
use crate::service_order::ServiceSongEntry;
use crate::song::{MemberId, ServiceId, Song, SongId, TenantId};
use crate::usage::{Period, UsageRecord};
use chrono::NaiveDate;
use log::{debug, trace};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

/// Open (or create) the planning database at `db_path`.
pub fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Create all tables. Safe to call on an existing database; pass `force` to
/// drop and recreate everything.
pub fn init_schema(conn: &Connection, force: bool) -> Result<()> {
    if force {
        conn.execute_batch(
            "DROP TABLE IF EXISTS service_song;
             DROP TABLE IF EXISTS usage_record;
             DROP TABLE IF EXISTS rating;
             DROP TABLE IF EXISTS service;
             DROP TABLE IF EXISTS song;
             DROP TABLE IF EXISTS tenant_config;",
        )?;
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS song (
            id               INTEGER PRIMARY KEY,
            tenant_id        INTEGER NOT NULL,
            title            TEXT    NOT NULL,
            artist           TEXT    NOT NULL,
            key              TEXT    NOT NULL DEFAULT '',
            tempo_bpm        INTEGER,
            duration_seconds INTEGER,
            active           INTEGER NOT NULL DEFAULT 1,
            retired          INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS service (
            id           INTEGER PRIMARY KEY,
            tenant_id    INTEGER NOT NULL,
            service_date TEXT    NOT NULL,
            version      INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS usage_record (
            song_id    INTEGER NOT NULL,
            service_id INTEGER NOT NULL,
            tenant_id  INTEGER NOT NULL,
            used_date  TEXT    NOT NULL,
            slot_index INTEGER NOT NULL DEFAULT 0,
            UNIQUE(song_id, service_id)
        );
        CREATE TABLE IF NOT EXISTS rating (
            song_id      INTEGER NOT NULL,
            member_id    INTEGER NOT NULL,
            tenant_id    INTEGER NOT NULL,
            value        TEXT    NOT NULL,
            is_difficult INTEGER NOT NULL DEFAULT 0,
            UNIQUE(song_id, member_id)
        );
        CREATE TABLE IF NOT EXISTS service_song (
            service_id        INTEGER NOT NULL,
            song_id           INTEGER NOT NULL,
            position          INTEGER NOT NULL,
            section_tag       TEXT    NOT NULL DEFAULT '',
            transposed_key    TEXT,
            duration_override INTEGER,
            UNIQUE(service_id, song_id)
        );
        CREATE TABLE IF NOT EXISTS tenant_config (
            tenant_id              INTEGER PRIMARY KEY,
            repetition_window_days INTEGER NOT NULL,
            recent_fraction        REAL    NOT NULL,
            min_samples            INTEGER NOT NULL,
            down_ratio             REAL    NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_usage_tenant_date
            ON usage_record(tenant_id, used_date);
        CREATE INDEX IF NOT EXISTS idx_rating_song ON rating(song_id);",
    )?;
    debug!("Database schema ready (force={force}).");
    Ok(())
}

// ---------------------------------------------------------------------------
// Songs
// ---------------------------------------------------------------------------

/// Insert a song; the id on the passed struct is ignored. Returns the new id.
pub fn insert_song(conn: &Connection, song: &Song) -> Result<SongId> {
    conn.execute(
        "INSERT INTO song (tenant_id, title, artist, key, tempo_bpm, duration_seconds, active, retired)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            song.tenant_id,
            song.title,
            song.artist,
            song.key,
            song.tempo_bpm,
            song.duration_seconds,
            song.active,
            song.retired,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_song(conn: &Connection, tenant_id: TenantId, song_id: SongId) -> Result<Song> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, title, artist, key, tempo_bpm, duration_seconds, active, retired
         FROM song WHERE tenant_id = ?1 AND id = ?2",
    )?;
    stmt.query_row(params![tenant_id, song_id], song_from_row)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("song {song_id}")))
}

/// All songs for the tenant, retired ones included, title order.
pub fn list_songs(conn: &Connection, tenant_id: TenantId) -> Result<Vec<Song>> {
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, title, artist, key, tempo_bpm, duration_seconds, active, retired
         FROM song WHERE tenant_id = ?1 ORDER BY title COLLATE NOCASE, id",
    )?;
    let rows = stmt.query_map([tenant_id], song_from_row)?;

    let mut songs = Vec::new();
    for song in rows {
        songs.push(song?);
    }
    Ok(songs)
}

/// Soft-retire: the song stays in the library so history keeps resolving.
pub fn retire_song(conn: &Connection, tenant_id: TenantId, song_id: SongId) -> Result<()> {
    let changed = conn.execute(
        "UPDATE song SET retired = 1 WHERE tenant_id = ?1 AND id = ?2",
        params![tenant_id, song_id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("song {song_id}")));
    }
    Ok(())
}

fn song_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        key: row.get(4)?,
        tempo_bpm: row.get(5)?,
        duration_seconds: row.get(6)?,
        active: row.get(7)?,
        retired: row.get(8)?,
    })
}

// ---------------------------------------------------------------------------
// Usage ledger
// ---------------------------------------------------------------------------

/// Append one usage fact. The ledger is append-only: a second record for the
/// same (song, service) pair is a validation failure, not an update.
pub fn record_usage(conn: &Connection, record: &UsageRecord) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM usage_record WHERE song_id = ?1 AND service_id = ?2)",
        params![record.song_id, record.service_id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(Error::validation(format!(
            "usage of song {} in service {} is already recorded",
            record.song_id, record.service_id
        )));
    }

    conn.execute(
        "INSERT INTO usage_record (song_id, service_id, tenant_id, used_date, slot_index)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.song_id,
            record.service_id,
            record.tenant_id,
            record.used_date,
            record.slot_index,
        ],
    )?;
    trace!(
        "Recorded usage of song {} in service {} on {}.",
        record.song_id,
        record.service_id,
        record.used_date
    );
    Ok(())
}

/// Fetch usage facts for a tenant, optionally narrowed to one song and/or a
/// half-open date range.
pub fn fetch_usage_records(
    conn: &Connection,
    tenant_id: TenantId,
    song_id: Option<SongId>,
    range: Option<Period>,
) -> Result<Vec<UsageRecord>> {
    let mut sql = String::from(
        "SELECT song_id, service_id, tenant_id, used_date, slot_index
         FROM usage_record WHERE tenant_id = ?1",
    );
    let mut values: Vec<Value> = vec![Value::from(tenant_id)];

    if let Some(song_id) = song_id {
        values.push(Value::from(song_id));
        sql.push_str(&format!(" AND song_id = ?{}", values.len()));
    }
    if let Some(period) = range {
        values.push(Value::from(period.start.format("%Y-%m-%d").to_string()));
        sql.push_str(&format!(" AND used_date >= ?{}", values.len()));
        values.push(Value::from(period.end.format("%Y-%m-%d").to_string()));
        sql.push_str(&format!(" AND used_date < ?{}", values.len()));
    }
    sql.push_str(" ORDER BY used_date, service_id, slot_index");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok(UsageRecord {
            song_id: row.get(0)?,
            service_id: row.get(1)?,
            tenant_id: row.get(2)?,
            used_date: row.get(3)?,
            slot_index: row.get(4)?,
        })
    })?;

    let mut records = Vec::new();
    for record in rows {
        records.push(record?);
    }
    Ok(records)
}

/// Latest date the song was scheduled, if ever. ISO dates compare correctly
/// as text, so MAX works on the stored column.
pub fn last_used(
    conn: &Connection,
    tenant_id: TenantId,
    song_id: SongId,
) -> Result<Option<NaiveDate>> {
    let last: Option<NaiveDate> = conn.query_row(
        "SELECT MAX(used_date) FROM usage_record WHERE tenant_id = ?1 AND song_id = ?2",
        params![tenant_id, song_id],
        |row| row.get(0),
    )?;
    Ok(last)
}

// ---------------------------------------------------------------------------
// Services and setlist entries
// ---------------------------------------------------------------------------

pub fn create_service(
    conn: &Connection,
    tenant_id: TenantId,
    service_date: NaiveDate,
) -> Result<ServiceId> {
    conn.execute(
        "INSERT INTO service (tenant_id, service_date) VALUES (?1, ?2)",
        params![tenant_id, service_date],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete a service and cascade to its setlist entries and usage facts; the
/// only path that ever removes ledger rows.
pub fn delete_service(conn: &mut Connection, service_id: ServiceId) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM service_song WHERE service_id = ?1", [service_id])?;
    tx.execute("DELETE FROM usage_record WHERE service_id = ?1", [service_id])?;
    let removed = tx.execute("DELETE FROM service WHERE id = ?1", [service_id])?;
    if removed == 0 {
        return Err(Error::NotFound(format!("service {service_id}")));
    }
    tx.commit()?;
    Ok(())
}

/// Append a song at the end of the service. The entry's `position` field is
/// ignored; the store assigns the next contiguous slot.
pub fn add_service_entry(conn: &Connection, entry: &ServiceSongEntry) -> Result<u32> {
    service_version(conn, entry.service_id)?; // NotFound check

    let next: u32 = conn.query_row(
        "SELECT COUNT(*) FROM service_song WHERE service_id = ?1",
        [entry.service_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO service_song (service_id, song_id, position, section_tag, transposed_key, duration_override)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.service_id,
            entry.song_id,
            next,
            entry.section_tag,
            entry.transposed_key,
            entry.duration_override,
        ],
    )?;
    Ok(next)
}

/// Entries of one service in position order.
pub fn fetch_service_entries(
    conn: &Connection,
    service_id: ServiceId,
) -> Result<Vec<ServiceSongEntry>> {
    let mut stmt = conn.prepare(
        "SELECT service_id, song_id, position, section_tag, transposed_key, duration_override
         FROM service_song WHERE service_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map([service_id], |row| {
        Ok(ServiceSongEntry {
            service_id: row.get(0)?,
            song_id: row.get(1)?,
            position: row.get(2)?,
            section_tag: row.get(3)?,
            transposed_key: row.get(4)?,
            duration_override: row.get(5)?,
        })
    })?;

    let mut entries = Vec::new();
    for entry in rows {
        entries.push(entry?);
    }
    Ok(entries)
}

/// Current optimistic-concurrency version of the service.
pub fn service_version(conn: &Connection, service_id: ServiceId) -> Result<i64> {
    conn.query_row(
        "SELECT version FROM service WHERE id = ?1",
        [service_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::NotFound(format!("service {service_id}")))
}

/// Replace the service's entries with a reordered set, atomically.
///
/// Fails with `Conflict` when someone else saved in between (version moved
/// past `expected_version`); nothing is written in that case and the caller
/// should refetch and retry. Returns the new version on success.
pub fn persist_reordered_entries(
    conn: &mut Connection,
    service_id: ServiceId,
    entries: &[ServiceSongEntry],
    expected_version: i64,
) -> Result<i64> {
    if entries.iter().any(|e| e.service_id != service_id) {
        return Err(Error::validation(format!(
            "entry set contains rows for another service than {service_id}"
        )));
    }

    let tx = conn.transaction()?;
    let current: i64 = tx
        .query_row(
            "SELECT version FROM service WHERE id = ?1",
            [service_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("service {service_id}")))?;
    if current != expected_version {
        return Err(Error::Conflict(format!(
            "service {service_id} is at version {current}, reorder was based on {expected_version}"
        )));
    }

    tx.execute("DELETE FROM service_song WHERE service_id = ?1", [service_id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO service_song (service_id, song_id, position, section_tag, transposed_key, duration_override)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for entry in entries {
            stmt.execute(params![
                entry.service_id,
                entry.song_id,
                entry.position,
                entry.section_tag,
                entry.transposed_key,
                entry.duration_override,
            ])?;
        }
    }
    tx.execute(
        "UPDATE service SET version = version + 1 WHERE id = ?1",
        [service_id],
    )?;
    tx.commit()?;

    debug!(
        "Persisted {} reordered entries for service {service_id} (now version {}).",
        entries.len(),
        current + 1
    );
    Ok(current + 1)
}

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

pub fn fetch_ratings(conn: &Connection, song_id: SongId) -> Result<Vec<Rating>> {
    let mut stmt = conn.prepare(
        "SELECT song_id, member_id, tenant_id, value, is_difficult
         FROM rating WHERE song_id = ?1 ORDER BY member_id",
    )?;
    let rows = stmt.query_map([song_id], rating_from_row)?;

    let mut ratings = Vec::new();
    for rating in rows {
        ratings.push(rating?);
    }
    Ok(ratings)
}

pub fn get_rating(
    conn: &Connection,
    song_id: SongId,
    member_id: MemberId,
) -> Result<Option<Rating>> {
    let mut stmt = conn.prepare(
        "SELECT song_id, member_id, tenant_id, value, is_difficult
         FROM rating WHERE song_id = ?1 AND member_id = ?2",
    )?;
    Ok(stmt
        .query_row(params![song_id, member_id], rating_from_row)
        .optional()?)
}

/// Last-write-wins upsert on the (song, member) key.
pub fn upsert_rating(conn: &Connection, rating: &Rating) -> Result<()> {
    conn.execute(
        "INSERT INTO rating (song_id, member_id, tenant_id, value, is_difficult)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(song_id, member_id)
         DO UPDATE SET value = excluded.value, is_difficult = excluded.is_difficult",
        params![
            rating.song_id,
            rating.member_id,
            rating.tenant_id,
            rating.value.as_str(),
            rating.is_difficult,
        ],
    )?;
    Ok(())
}

pub fn delete_rating(conn: &Connection, song_id: SongId, member_id: MemberId) -> Result<()> {
    let removed = conn.execute(
        "DELETE FROM rating WHERE song_id = ?1 AND member_id = ?2",
        params![song_id, member_id],
    )?;
    if removed == 0 {
        return Err(Error::NotFound(format!(
            "rating of song {song_id} by member {member_id}"
        )));
    }
    Ok(())
}

fn rating_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Rating> {
    let raw: String = row.get(3)?;
    let value = RatingValue::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown rating value '{raw}'").into(),
        )
    })?;
    Ok(Rating {
        song_id: row.get(0)?,
        member_id: row.get(1)?,
        tenant_id: row.get(2)?,
        value,
        is_difficult: row.get(4)?,
    })
}

// ---------------------------------------------------------------------------
// Tenant configuration
// ---------------------------------------------------------------------------

/// Rotation settings for the tenant, falling back to defaults when the
/// tenant never configured anything.
pub fn get_rotation_config(conn: &Connection, tenant_id: TenantId) -> Result<RotationConfig> {
    let config = conn
        .query_row(
            "SELECT repetition_window_days, recent_fraction FROM tenant_config WHERE tenant_id = ?1",
            [tenant_id],
            |row| {
                Ok(RotationConfig {
                    repetition_window_days: row.get(0)?,
                    recent_fraction: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(config.unwrap_or_default())
}

pub fn get_retire_policy(conn: &Connection, tenant_id: TenantId) -> Result<RetirePolicy> {
    let policy = conn
        .query_row(
            "SELECT min_samples, down_ratio FROM tenant_config WHERE tenant_id = ?1",
            [tenant_id],
            |row| {
                Ok(RetirePolicy {
                    min_samples: row.get(0)?,
                    down_ratio: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(policy.unwrap_or_default())
}

/// Persist the rotation window, keeping the tenant's retire policy as is.
pub fn set_rotation_config(
    conn: &Connection,
    tenant_id: TenantId,
    config: &RotationConfig,
) -> Result<()> {
    config.validate()?;
    let policy = get_retire_policy(conn, tenant_id)?;
    upsert_tenant_config(conn, tenant_id, config, &policy)
}

/// Persist the retire thresholds, keeping the rotation window as is.
pub fn set_retire_policy(
    conn: &Connection,
    tenant_id: TenantId,
    policy: &RetirePolicy,
) -> Result<()> {
    if !(policy.down_ratio > 0.0 && policy.down_ratio <= 1.0) {
        return Err(Error::validation("down ratio must be within (0, 1]"));
    }
    let config = get_rotation_config(conn, tenant_id)?;
    upsert_tenant_config(conn, tenant_id, &config, policy)
}

fn upsert_tenant_config(
    conn: &Connection,
    tenant_id: TenantId,
    config: &RotationConfig,
    policy: &RetirePolicy,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tenant_config (tenant_id, repetition_window_days, recent_fraction, min_samples, down_ratio)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(tenant_id) DO UPDATE SET
             repetition_window_days = excluded.repetition_window_days,
             recent_fraction = excluded.recent_fraction,
             min_samples = excluded.min_samples,
             down_ratio = excluded.down_ratio",
        params![
            tenant_id,
            config.repetition_window_days,
            config.recent_fraction,
            policy.min_samples,
            policy.down_ratio,
        ],
    )?;
    Ok(())
}
