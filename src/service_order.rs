//! Setlist ordering: atomic reorder and aggregate duration.
//!
//! `reorder` is pure: it validates the requested permutation against a
//! snapshot of the entries and returns a fully renumbered replacement, or an
//! error and no change at all. Applying the replacement transactionally (and
//! retrying on conflict) is the store's job, not this module's.

use crate::error::{Error, Result};
use crate::song::{ServiceId, Song, SongId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One song slot within a service.
///
/// Within one service, positions are contiguous `0..N-1` with no duplicates;
/// every reorder re-establishes that invariant as a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSongEntry {
    pub service_id: ServiceId,
    pub song_id: SongId,
    pub position: u32,
    /// Which part of the service the song belongs to, e.g. "praise" or
    /// "communion". Free-form, tenant vocabulary.
    pub section_tag: String,
    pub transposed_key: Option<String>,
    pub duration_override: Option<u32>,
}

/// Renumber `entries` to the sequence given by `new_order`.
///
/// `new_order` must be an exact permutation of the song ids present in
/// `entries`; a missing, duplicate or foreign id fails validation and leaves
/// the input untouched. Partial reorders are never produced. An empty service
/// with an empty order is a no-op success.
pub fn reorder(entries: &[ServiceSongEntry], new_order: &[SongId]) -> Result<Vec<ServiceSongEntry>> {
    if new_order.len() != entries.len() {
        return Err(Error::validation(format!(
            "reorder lists {} songs but the service has {}",
            new_order.len(),
            entries.len()
        )));
    }

    let mut by_song: HashMap<SongId, &ServiceSongEntry> = HashMap::with_capacity(entries.len());
    for entry in entries {
        if by_song.insert(entry.song_id, entry).is_some() {
            // Snapshot itself broken; refuse rather than guess.
            return Err(Error::validation(format!(
                "service contains song {} more than once",
                entry.song_id
            )));
        }
    }

    let mut seen: HashSet<SongId> = HashSet::with_capacity(new_order.len());
    for &song_id in new_order {
        if !seen.insert(song_id) {
            return Err(Error::validation(format!(
                "song {song_id} appears twice in the new order"
            )));
        }
        if !by_song.contains_key(&song_id) {
            return Err(Error::validation(format!(
                "song {song_id} is not part of the service"
            )));
        }
    }

    // Equal lengths, no duplicates, no foreign ids: a true permutation.
    Ok(new_order
        .iter()
        .enumerate()
        .map(|(index, song_id)| {
            let entry = by_song[song_id];
            ServiceSongEntry {
                position: index as u32,
                ..entry.clone()
            }
        })
        .collect())
}

/// Total planned seconds for the service.
///
/// Per entry: the override if set, else the song's nominal duration, else 0.
/// One well-defined fallback chain; a song with no known duration contributes
/// nothing instead of failing the report.
#[must_use]
pub fn total_duration(entries: &[ServiceSongEntry], songs: &HashMap<SongId, Song>) -> u32 {
    entries
        .iter()
        .map(|entry| {
            entry.duration_override.unwrap_or_else(|| {
                songs
                    .get(&entry.song_id)
                    .and_then(|s| s.duration_seconds)
                    .unwrap_or(0)
            })
        })
        .sum()
}
