//! Top-songs ranking over rolling periods, with rank-change trends.
//!
//! Counts usage per song inside a half-open period, orders by a fully
//! deterministic key (count desc, title asc case-insensitive, id asc) and
//! compares against the full ranking of the preceding period. Iteration order
//! of the underlying maps never leaks into the output.

use crate::song::{Song, SongId};
use crate::usage::{Period, UsageRecord};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Direction of a song's rank movement between the previous and the current
/// period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    /// Ranked now, absent from the previous period entirely.
    New,
    Up,
    Down,
    Unchanged,
}

/// One row of the top-songs report, ordered by `rank`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub song_id: SongId,
    pub title: String,
    /// 1-indexed position in the current period.
    pub rank: u32,
    pub usage_count: u32,
    pub trend: Trend,
    /// Places moved for `Up`/`Down`; zero for `New` and `Unchanged`.
    pub delta: u32,
}

/// Rank songs by usage in `current`, with trends against `previous`.
///
/// The usage slice must already be tenant-scoped. Songs with zero usage in
/// the current period are never ranked, even if they ranked previously; the
/// previous-period view is the place to find them, not a phantom zero-count
/// row here. `songs` supplies titles for the tie-break and the report; a
/// missing song falls back to an empty title and stays ranked by count and
/// id.
#[must_use]
pub fn rank(
    usage: &[UsageRecord],
    songs: &HashMap<SongId, Song>,
    current: Period,
    previous: Period,
    limit: usize,
) -> Vec<RankedEntry> {
    let current_order = ordered_counts(&period_counts(usage, current), songs);
    let previous_order = ordered_counts(&period_counts(usage, previous), songs);

    // Full previous ranking, 1-indexed. Truncation only applies to the
    // current list; a song far down the previous list must still resolve.
    let previous_ranks: HashMap<SongId, u32> = previous_order
        .iter()
        .enumerate()
        .map(|(index, (song_id, _))| (*song_id, index as u32 + 1))
        .collect();

    debug!(
        "Ranking {} current / {} previous songs from {} usage records.",
        current_order.len(),
        previous_order.len(),
        usage.len()
    );

    current_order
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (song_id, usage_count))| {
            let rank = index as u32 + 1;
            let (trend, delta) = match previous_ranks.get(&song_id) {
                None => (Trend::New, 0),
                Some(&prev) if prev > rank => (Trend::Up, prev - rank),
                Some(&prev) if prev < rank => (Trend::Down, rank - prev),
                Some(_) => (Trend::Unchanged, 0),
            };
            RankedEntry {
                song_id,
                title: title_of(songs, song_id),
                rank,
                usage_count,
                trend,
                delta,
            }
        })
        .collect()
}

/// Usage count per song within the period. Zero-count songs never appear.
fn period_counts(usage: &[UsageRecord], period: Period) -> HashMap<SongId, u32> {
    let mut counts: HashMap<SongId, u32> = HashMap::new();
    for record in usage.iter().filter(|r| period.contains(r.used_date)) {
        *counts.entry(record.song_id).or_insert(0) += 1;
    }
    counts
}

/// Strict total order: count desc, then title asc (case-insensitive), then
/// id asc. Identical input always yields identical output.
fn ordered_counts(
    counts: &HashMap<SongId, u32>,
    songs: &HashMap<SongId, Song>,
) -> Vec<(SongId, u32)> {
    let mut ordered: Vec<(SongId, u32)> = counts.iter().map(|(&id, &n)| (id, n)).collect();
    ordered.sort_by_key(|&(song_id, count)| {
        (
            Reverse(count),
            title_of(songs, song_id).to_lowercase(),
            song_id,
        )
    });
    ordered
}

fn title_of(songs: &HashMap<SongId, Song>, song_id: SongId) -> String {
    songs
        .get(&song_id)
        .map(|s| s.title.clone())
        .unwrap_or_default()
}
