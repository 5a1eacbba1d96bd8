//! Song records and the id aliases used across the crate.
//!
//! All data is scoped to exactly one tenant (one church or organization); every
//! query and every computation receives already tenant-scoped input. The core
//! never evaluates an authorization rule: isolation is the caller's contract.

use serde::{Deserialize, Serialize};

pub type SongId = i64;
pub type ServiceId = i64;
pub type TenantId = i64;
pub type MemberId = i64;

/// A song and its display metadata, as stored in the library.
///
/// Songs are long-lived and never physically deleted while usage or rating
/// history references them; retirement is a soft flag only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub tenant_id: TenantId,
    pub title: String,
    pub artist: String,
    /// Musical key as written, e.g. "G" or "Em". Free-form on purpose.
    pub key: String,
    pub tempo_bpm: Option<u32>,
    /// Nominal duration. Per-service overrides live on the setlist entry.
    pub duration_seconds: Option<u32>,
    pub active: bool,
    pub retired: bool,
}

impl Song {
    /// A song is schedulable when it is active and not retired. Retired songs
    /// stay in the library so history keeps resolving.
    #[must_use]
    pub fn schedulable(&self) -> bool {
        self.active && !self.retired
    }
}
