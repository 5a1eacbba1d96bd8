//! Usage facts: the append-only record that a song was scheduled in a
//! service on a date.
//!
//! A `UsageRecord` is created exactly once when a song is attached to a
//! service that actually occurs, and is immutable afterwards. The only way a
//! record disappears is the cascading delete of its service. Everything else
//! in this crate (rotation status, top-songs ranking) is a pure function over
//! these facts, recomputable at any time.

use crate::song::{ServiceId, SongId, TenantId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One scheduling fact. At most one per (song_id, service_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub song_id: SongId,
    pub service_id: ServiceId,
    pub tenant_id: TenantId,
    pub used_date: NaiveDate,
    /// Position the song held within the service, for reporting only.
    pub slot_index: u32,
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Build the period covering the `days` days ending at `end` (exclusive).
    #[must_use]
    pub fn ending_at(end: NaiveDate, days: u32) -> Self {
        Self {
            start: end - chrono::Duration::days(i64::from(days)),
            end,
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// The period of equal length immediately before this one. Used to
    /// compare rankings between two adjacent windows.
    #[must_use]
    pub fn preceding(&self) -> Self {
        let span = self.end - self.start;
        Self {
            start: self.start - span,
            end: self.start,
        }
    }
}

/// Latest `used_date` per song across the given records.
///
/// Feeds the rotation classifier; songs absent from the map have never been
/// used.
#[must_use]
pub fn last_used_dates(usage: &[UsageRecord]) -> HashMap<SongId, NaiveDate> {
    let mut last: HashMap<SongId, NaiveDate> = HashMap::new();
    for record in usage {
        last.entry(record.song_id)
            .and_modify(|d| {
                if record.used_date > *d {
                    *d = record.used_date;
                }
            })
            .or_insert(record.used_date);
    }
    last
}
