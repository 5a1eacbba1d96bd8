//! Rotation status classification.
//!
//! Derives how "fresh" a song is for reuse from its last scheduled date and
//! the tenant's rotation window. Pure and O(1); called once per song per
//! display or ranking pass.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use log::trace;
use serde::{Deserialize, Serialize};

/// Tenant-level rotation settings.
///
/// `repetition_window_days` is how long a song should rest before it is fully
/// available again. `recent_fraction` sets the strong-discourage band as a
/// fraction of the window; the quarter-window default is a design choice, not
/// an inherited constant, so it is configurable rather than baked in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationConfig {
    pub repetition_window_days: u32,
    pub recent_fraction: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            repetition_window_days: 28,
            recent_fraction: 0.25,
        }
    }
}

impl RotationConfig {
    /// Reject out-of-range settings before they are persisted.
    pub fn validate(&self) -> Result<()> {
        if self.repetition_window_days == 0 {
            return Err(Error::validation("repetition window must be positive"));
        }
        if !(self.recent_fraction > 0.0 && self.recent_fraction <= 1.0) {
            return Err(Error::validation(
                "recent fraction must be within (0, 1]",
            ));
        }
        Ok(())
    }

    /// Days-since threshold below which a song counts as recently used.
    ///
    /// Whole days, clamped into `[1, window]` so the three bands keep their
    /// ordering and a same-day use always classifies as `Recent`.
    #[must_use]
    pub fn recent_cutoff_days(&self) -> i64 {
        let window = i64::from(self.repetition_window_days);
        let cutoff = (self.repetition_window_days as f64 * self.recent_fraction).floor() as i64;
        cutoff.clamp(1, window)
    }
}

/// Rotation status badge for one song.
///
/// `NeverUsed` is deliberately distinct from `Available`: a brand-new song
/// and a long-rested song are both schedulable but operationally different.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageStatus {
    /// Used within the strong-discourage band; reuse now repeats too soon.
    Recent,
    /// Inside the rotation window but past the strong-discourage band.
    Caution,
    /// Rested for at least the full window.
    Available,
    /// No usage fact exists for this song.
    NeverUsed,
}

impl UsageStatus {
    /// Short badge text for list output.
    #[must_use]
    pub fn badge(&self) -> &'static str {
        match self {
            UsageStatus::Recent => "recent",
            UsageStatus::Caution => "caution",
            UsageStatus::Available => "available",
            UsageStatus::NeverUsed => "never used",
        }
    }
}

/// Classify a song's freshness for reuse.
///
/// `days_since` is clamped to zero when `last_used` is in the future (a data
/// error), which lands in `Recent`. Monotonic: growing `days_since` only ever
/// moves `Recent` toward `Caution` toward `Available`.
#[must_use]
pub fn classify(
    last_used: Option<NaiveDate>,
    today: NaiveDate,
    config: &RotationConfig,
) -> UsageStatus {
    let Some(last) = last_used else {
        return UsageStatus::NeverUsed;
    };

    let days_since = (today - last).num_days().max(0);
    let window = i64::from(config.repetition_window_days);

    let status = if days_since >= window {
        UsageStatus::Available
    } else if days_since < config.recent_cutoff_days() {
        UsageStatus::Recent
    } else {
        UsageStatus::Caution
    };
    trace!("Classified {days_since} days since use as {status:?} (window {window}).");
    status
}
