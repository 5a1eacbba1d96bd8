//! End-to-end tests over a real database file.
//!
//! Each test opens a fresh SQLite file in a temporary directory and drives
//! the full flow the CLI would: seed the library, record history, then run
//! the analytics over what the store returns.

use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::HashMap;
use tempfile::TempDir;

use setlist::error::Error;
use setlist::ranking::{self, Trend};
use setlist::rating::{self, Rating, RatingValue, RetirePolicy};
use setlist::rotation::{self, RotationConfig, UsageStatus};
use setlist::service_order::{self, ServiceSongEntry};
use setlist::song::{Song, SongId};
use setlist::usage::{last_used_dates, Period, UsageRecord};
use setlist::db;

fn setup_db() -> (TempDir, Connection) {
    let dir = TempDir::new().unwrap();
    let conn = db::connect(&dir.path().join("planning.db")).unwrap();
    db::init_schema(&conn, false).unwrap();
    (dir, conn)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn add_song(conn: &Connection, tenant: i64, title: &str, duration: Option<u32>) -> SongId {
    db::insert_song(
        conn,
        &Song {
            tenant_id: tenant,
            title: title.to_string(),
            artist: "Traditional".to_string(),
            active: true,
            duration_seconds: duration,
            ..Song::default()
        },
    )
    .unwrap()
}

/// Create a service on `day` and record usage for each song in order.
fn hold_service(conn: &Connection, tenant: i64, day: NaiveDate, songs: &[SongId]) -> i64 {
    let service = db::create_service(conn, tenant, day).unwrap();
    for (slot, &song) in songs.iter().enumerate() {
        db::add_service_entry(
            conn,
            &ServiceSongEntry {
                service_id: service,
                song_id: song,
                position: 0,
                section_tag: String::new(),
                transposed_key: None,
                duration_override: None,
            },
        )
        .unwrap();
        db::record_usage(
            conn,
            &UsageRecord {
                song_id: song,
                service_id: service,
                tenant_id: tenant,
                used_date: day,
                slot_index: slot as u32,
            },
        )
        .unwrap();
    }
    service
}

#[test]
fn usage_history_drives_top_songs_with_trends() {
    let (_dir, conn) = setup_db();
    let grace = add_song(&conn, 1, "Amazing Grace", Some(260));
    let oceans = add_song(&conn, 1, "Oceans", Some(380));
    let cornerstone = add_song(&conn, 1, "Cornerstone", Some(300));

    // Previous 30 days: Oceans twice, Amazing Grace once.
    hold_service(&conn, 1, date(2024, 3, 3), &[oceans, grace]);
    hold_service(&conn, 1, date(2024, 3, 17), &[oceans]);
    // Current 30 days: Amazing Grace twice, Oceans once, Cornerstone debuts.
    hold_service(&conn, 1, date(2024, 4, 7), &[grace, cornerstone]);
    hold_service(&conn, 1, date(2024, 4, 21), &[grace, oceans]);

    let current = Period {
        start: date(2024, 4, 1),
        end: date(2024, 5, 1),
    };
    let previous = current.preceding();
    let usage = db::fetch_usage_records(
        &conn,
        1,
        None,
        Some(Period {
            start: previous.start,
            end: current.end,
        }),
    )
    .unwrap();
    let songs: HashMap<SongId, Song> = db::list_songs(&conn, 1)
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let ranked = ranking::rank(&usage, &songs, current, previous, 10);
    assert_eq!(ranked.len(), 3);

    assert_eq!(ranked[0].title, "Amazing Grace");
    assert_eq!(ranked[0].usage_count, 2);
    assert_eq!(ranked[0].trend, Trend::Up);
    assert_eq!(ranked[0].delta, 1);

    assert_eq!(ranked[1].title, "Cornerstone");
    assert_eq!(ranked[1].trend, Trend::New);

    assert_eq!(ranked[2].title, "Oceans");
    assert_eq!(ranked[2].trend, Trend::Down);
    assert_eq!(ranked[2].delta, 2);
}

#[test]
fn rotation_badges_follow_the_stored_history() {
    let (_dir, conn) = setup_db();
    let fresh = add_song(&conn, 1, "Sung Last Week", None);
    let resting = add_song(&conn, 1, "Sung A While Ago", None);
    let rested = add_song(&conn, 1, "Long Rested", None);
    let unused = add_song(&conn, 1, "Never Scheduled", None);

    let today = date(2024, 6, 1);
    hold_service(&conn, 1, today - chrono::Duration::days(5), &[fresh]);
    hold_service(&conn, 1, today - chrono::Duration::days(20), &[resting]);
    hold_service(&conn, 1, today - chrono::Duration::days(90), &[rested]);

    let config = RotationConfig::default(); // 28-day window, 7-day recent band
    let usage = db::fetch_usage_records(&conn, 1, None, None).unwrap();
    let last = last_used_dates(&usage);

    let status = |song| rotation::classify(last.get(&song).copied(), today, &config);
    assert_eq!(status(fresh), UsageStatus::Recent);
    assert_eq!(status(resting), UsageStatus::Caution);
    assert_eq!(status(rested), UsageStatus::Available);
    assert_eq!(status(unused), UsageStatus::NeverUsed);
}

#[test]
fn ratings_accumulate_into_the_auto_retire_signal() {
    let (_dir, conn) = setup_db();
    let song = add_song(&conn, 1, "Tired Anthem", None);

    for (member, value) in [
        (1, RatingValue::Down),
        (2, RatingValue::Down),
        (3, RatingValue::Up),
    ] {
        db::upsert_rating(
            &conn,
            &Rating {
                song_id: song,
                member_id: member,
                tenant_id: 1,
                value,
                is_difficult: false,
            },
        )
        .unwrap();
    }

    let summary = rating::aggregate(song, &db::fetch_ratings(&conn, song).unwrap());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.down_count, 2);
    assert!(rating::should_auto_retire(
        &summary,
        &db::get_retire_policy(&conn, 1).unwrap()
    ));

    // Member 2 changes their mind; the signal goes quiet.
    db::upsert_rating(
        &conn,
        &Rating {
            song_id: song,
            member_id: 2,
            tenant_id: 1,
            value: RatingValue::Up,
            is_difficult: false,
        },
    )
    .unwrap();
    let summary = rating::aggregate(song, &db::fetch_ratings(&conn, song).unwrap());
    assert!(!rating::should_auto_retire(
        &summary,
        &db::get_retire_policy(&conn, 1).unwrap()
    ));
}

#[test]
fn retire_policy_is_tenant_configurable() {
    let (_dir, conn) = setup_db();
    let song = add_song(&conn, 1, "Borderline", None);
    for member in 1..=4 {
        db::upsert_rating(
            &conn,
            &Rating {
                song_id: song,
                member_id: member,
                tenant_id: 1,
                value: if member <= 2 {
                    RatingValue::Down
                } else {
                    RatingValue::Up
                },
                is_difficult: false,
            },
        )
        .unwrap();
    }

    let summary = rating::aggregate(song, &db::fetch_ratings(&conn, song).unwrap());
    // 2/4 down: below the default 60% threshold.
    assert!(!rating::should_auto_retire(
        &summary,
        &db::get_retire_policy(&conn, 1).unwrap()
    ));

    db::set_retire_policy(
        &conn,
        1,
        &RetirePolicy {
            min_samples: 3,
            down_ratio: 0.5,
        },
    )
    .unwrap();
    assert!(rating::should_auto_retire(
        &summary,
        &db::get_retire_policy(&conn, 1).unwrap()
    ));
}

#[test]
fn reorder_roundtrips_and_rejects_stale_writers() {
    let (_dir, mut conn) = setup_db();
    let a = add_song(&conn, 1, "Opener", Some(240));
    let b = add_song(&conn, 1, "Middle", Some(300));
    let c = add_song(&conn, 1, "Closer", Some(180));
    let service = hold_service(&conn, 1, date(2024, 5, 5), &[a, b, c]);

    let entries = db::fetch_service_entries(&conn, service).unwrap();
    let version = db::service_version(&conn, service).unwrap();

    let reordered = service_order::reorder(&entries, &[c, a, b]).unwrap();
    db::persist_reordered_entries(&mut conn, service, &reordered, version).unwrap();

    let stored = db::fetch_service_entries(&conn, service).unwrap();
    let order: Vec<SongId> = stored.iter().map(|e| e.song_id).collect();
    assert_eq!(order, vec![c, a, b]);
    let positions: Vec<u32> = stored.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);

    // A second writer still holding the pre-reorder version loses.
    let stale = service_order::reorder(&entries, &[a, b, c]).unwrap();
    let err = db::persist_reordered_entries(&mut conn, service, &stale, version).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    let after: Vec<SongId> = db::fetch_service_entries(&conn, service)
        .unwrap()
        .iter()
        .map(|e| e.song_id)
        .collect();
    assert_eq!(after, vec![c, a, b]);
}

#[test]
fn invalid_reorder_never_touches_the_store() {
    let (_dir, conn) = setup_db();
    let a = add_song(&conn, 1, "One", None);
    let b = add_song(&conn, 1, "Two", None);
    let service = hold_service(&conn, 1, date(2024, 5, 5), &[a, b]);

    let entries = db::fetch_service_entries(&conn, service).unwrap();
    let err = service_order::reorder(&entries, &[a, 999]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let stored: Vec<SongId> = db::fetch_service_entries(&conn, service)
        .unwrap()
        .iter()
        .map(|e| e.song_id)
        .collect();
    assert_eq!(stored, vec![a, b]);
    assert_eq!(db::service_version(&conn, service).unwrap(), 0);
}

#[test]
fn total_duration_respects_overrides() {
    let (_dir, mut conn) = setup_db();
    let a = add_song(&conn, 1, "Known", Some(240));
    let b = add_song(&conn, 1, "Unknown Length", None);
    let service = hold_service(&conn, 1, date(2024, 5, 5), &[a, b]);

    let mut entries = db::fetch_service_entries(&conn, service).unwrap();
    entries[1].duration_override = Some(90);
    let version = db::service_version(&conn, service).unwrap();
    db::persist_reordered_entries(&mut conn, service, &entries, version).unwrap();

    let stored = db::fetch_service_entries(&conn, service).unwrap();
    let songs: HashMap<SongId, Song> = db::list_songs(&conn, 1)
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    assert_eq!(service_order::total_duration(&stored, &songs), 240 + 90);
}

#[test]
fn tenants_never_see_each_other() {
    let (_dir, conn) = setup_db();
    let ours = add_song(&conn, 1, "Ours", None);
    let theirs = add_song(&conn, 2, "Theirs", None);
    hold_service(&conn, 1, date(2024, 4, 7), &[ours]);
    hold_service(&conn, 2, date(2024, 4, 7), &[theirs]);

    let mine = db::list_songs(&conn, 1).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Ours");

    let usage = db::fetch_usage_records(&conn, 2, None, None).unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].song_id, theirs);

    // Configs are independent too.
    db::set_rotation_config(
        &conn,
        2,
        &RotationConfig {
            repetition_window_days: 60,
            recent_fraction: 0.25,
        },
    )
    .unwrap();
    assert_eq!(
        db::get_rotation_config(&conn, 1).unwrap(),
        RotationConfig::default()
    );
}

#[test]
fn retired_songs_stay_resolvable_in_history() {
    let (_dir, conn) = setup_db();
    let song = add_song(&conn, 1, "Retired Classic", Some(200));
    hold_service(&conn, 1, date(2024, 4, 7), &[song]);

    db::retire_song(&conn, 1, song).unwrap();
    let stored = db::get_song(&conn, 1, song).unwrap();
    assert!(stored.retired);
    assert!(!stored.schedulable());

    // Its usage fact and ranking presence are untouched.
    let usage = db::fetch_usage_records(&conn, 1, Some(song), None).unwrap();
    assert_eq!(usage.len(), 1);
    let songs: HashMap<SongId, Song> = [(song, stored)].into_iter().collect();
    let current = Period {
        start: date(2024, 4, 1),
        end: date(2024, 5, 1),
    };
    let ranked = ranking::rank(&usage, &songs, current, current.preceding(), 10);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].title, "Retired Classic");
}

#[test]
fn deleting_a_service_erases_its_usage_facts() {
    let (_dir, mut conn) = setup_db();
    let song = add_song(&conn, 1, "One Hit", None);
    let keep = hold_service(&conn, 1, date(2024, 4, 7), &[song]);
    let gone = hold_service(&conn, 1, date(2024, 4, 14), &[song]);
    // Same song twice needs two services; the ledger forbids it otherwise.

    db::delete_service(&mut conn, gone).unwrap();
    let usage = db::fetch_usage_records(&conn, 1, Some(song), None).unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].service_id, keep);
}
