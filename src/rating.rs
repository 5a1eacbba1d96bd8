//! Rating records and the per-song aggregation that drives auto-retirement.
//!
//! Ratings are one-per-(song, member), last-write-wins. The summary is never
//! stored authoritatively; it is a pure fold over the current rating set and
//! must stay reproducible from it. `should_auto_retire` only evaluates the
//! predicate: emitting the retirement signal, or flipping the song's flag, is
//! a collaborator's job.

use crate::song::{MemberId, SongId, TenantId};
use log::trace;
use serde::{Deserialize, Serialize};

/// A member's verdict on a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingValue {
    Up,
    Neutral,
    Down,
}

impl RatingValue {
    /// Stable text form used in storage and display.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingValue::Up => "up",
            RatingValue::Neutral => "neutral",
            RatingValue::Down => "down",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(RatingValue::Up),
            "neutral" => Some(RatingValue::Neutral),
            "down" => Some(RatingValue::Down),
            _ => None,
        }
    }
}

/// One member's current rating of one song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub song_id: SongId,
    pub member_id: MemberId,
    pub tenant_id: TenantId,
    pub value: RatingValue,
    /// Flagged hard to play/sing, independent of the thumb direction.
    pub is_difficult: bool,
}

/// Derived tallies for one song. `total` counts ratings, not difficulty
/// flags: a difficult-but-up rating contributes to both `up_count` and
/// `difficult_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub song_id: SongId,
    pub up_count: u32,
    pub neutral_count: u32,
    pub down_count: u32,
    pub difficult_count: u32,
    pub total: u32,
}

/// Tenant-configurable thresholds for the auto-retire signal.
///
/// The sample floor exists so one grumpy vote cannot retire a song.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetirePolicy {
    pub min_samples: u32,
    pub down_ratio: f64,
}

impl Default for RetirePolicy {
    fn default() -> Self {
        Self {
            min_samples: 3,
            down_ratio: 0.6,
        }
    }
}

/// Fold all ratings for one song into a summary.
///
/// The caller passes the ratings already scoped to `song_id`; ratings for
/// other songs in the slice are ignored rather than miscounted.
#[must_use]
pub fn aggregate(song_id: SongId, ratings: &[Rating]) -> RatingSummary {
    let mut summary = RatingSummary {
        song_id,
        ..RatingSummary::default()
    };

    for rating in ratings.iter().filter(|r| r.song_id == song_id) {
        match rating.value {
            RatingValue::Up => summary.up_count += 1,
            RatingValue::Neutral => summary.neutral_count += 1,
            RatingValue::Down => summary.down_count += 1,
        }
        if rating.is_difficult {
            summary.difficult_count += 1;
        }
    }

    summary.total = summary.up_count + summary.neutral_count + summary.down_count;
    trace!(
        "Aggregated {} ratings for song {song_id} ({} down).",
        summary.total,
        summary.down_count
    );
    summary
}

/// True when the song has gathered enough samples and enough of them are
/// thumbs-down. Never true below the sample floor, regardless of ratio.
#[must_use]
pub fn should_auto_retire(summary: &RatingSummary, policy: &RetirePolicy) -> bool {
    if summary.total < policy.min_samples || summary.total == 0 {
        return false;
    }
    f64::from(summary.down_count) / f64::from(summary.total) >= policy.down_ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(member_id: MemberId, value: RatingValue, is_difficult: bool) -> Rating {
        Rating {
            song_id: 1,
            member_id,
            tenant_id: 1,
            value,
            is_difficult,
        }
    }

    #[test]
    fn aggregate_tallies_by_value() {
        let ratings = vec![
            rating(1, RatingValue::Up, false),
            rating(2, RatingValue::Up, true),
            rating(3, RatingValue::Neutral, false),
            rating(4, RatingValue::Down, true),
        ];
        let summary = aggregate(1, &ratings);
        assert_eq!(summary.up_count, 2);
        assert_eq!(summary.neutral_count, 1);
        assert_eq!(summary.down_count, 1);
        assert_eq!(summary.difficult_count, 2);
        assert_eq!(summary.total, 4);
    }

    #[test]
    fn aggregate_total_matches_rating_count() {
        // Property from the contract: total == number of ratings for the song.
        let ratings: Vec<Rating> = (0..17)
            .map(|i| {
                rating(
                    i,
                    match i % 3 {
                        0 => RatingValue::Up,
                        1 => RatingValue::Neutral,
                        _ => RatingValue::Down,
                    },
                    i % 4 == 0,
                )
            })
            .collect();
        let summary = aggregate(1, &ratings);
        assert_eq!(summary.total as usize, ratings.len());
        assert_eq!(
            summary.total,
            summary.up_count + summary.neutral_count + summary.down_count
        );
    }

    #[test]
    fn aggregate_ignores_other_songs() {
        let mut ratings = vec![rating(1, RatingValue::Down, false)];
        ratings.push(Rating {
            song_id: 99,
            ..rating(2, RatingValue::Up, false)
        });
        let summary = aggregate(1, &ratings);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.up_count, 0);
    }

    #[test]
    fn aggregate_empty_is_all_zero() {
        let summary = aggregate(7, &[]);
        assert_eq!(summary, RatingSummary {
            song_id: 7,
            ..RatingSummary::default()
        });
    }

    #[test]
    fn no_retire_below_sample_floor() {
        // Two downs out of two is a 100% down ratio, but under min_samples.
        let summary = aggregate(
            1,
            &[
                rating(1, RatingValue::Down, false),
                rating(2, RatingValue::Down, false),
            ],
        );
        let policy = RetirePolicy::default();
        assert!(!should_auto_retire(&summary, &policy));
    }

    #[test]
    fn retire_at_threshold() {
        // 3 ratings, 2 down: ratio 0.667 >= 0.6 with enough samples.
        let summary = aggregate(
            1,
            &[
                rating(1, RatingValue::Down, false),
                rating(2, RatingValue::Down, true),
                rating(3, RatingValue::Up, false),
            ],
        );
        let policy = RetirePolicy::default();
        assert!(should_auto_retire(&summary, &policy));
    }

    #[test]
    fn no_retire_when_ratio_below_threshold() {
        let summary = aggregate(
            1,
            &[
                rating(1, RatingValue::Down, false),
                rating(2, RatingValue::Up, false),
                rating(3, RatingValue::Up, false),
                rating(4, RatingValue::Neutral, false),
            ],
        );
        assert!(!should_auto_retire(&summary, &RetirePolicy::default()));
    }

    #[test]
    fn zero_total_never_retires_even_with_zero_floor() {
        let summary = aggregate(1, &[]);
        let policy = RetirePolicy {
            min_samples: 0,
            down_ratio: 0.0,
        };
        assert!(!should_auto_retire(&summary, &policy));
    }

    #[test]
    fn difficult_count_is_independent_of_value() {
        let ratings = vec![
            rating(1, RatingValue::Up, true),
            rating(2, RatingValue::Down, true),
            rating(3, RatingValue::Neutral, true),
        ];
        let summary = aggregate(1, &ratings);
        assert_eq!(summary.difficult_count, 3);
    }
}
