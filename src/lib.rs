//! # Setlist Library
//!
//! Song usage and rotation analytics for worship service planning.
//!
//! The crate splits into pure analytics and a storage collaborator:
//!
//! - [`rating`]: per-song rating aggregation and the auto-retire signal
//! - [`rotation`]: freshness classification against the rotation window
//! - [`ranking`]: top-songs reports with period-over-period trends
//! - [`service_order`]: permutation-checked atomic reordering of a service
//! - [`db`]: the SQLite store the analytics read from and write through
//!
//! The analytics modules never touch storage; they take slices and maps and
//! return values, so they are equally usable over any backing store that can
//! produce [`usage::UsageRecord`]s, [`rating::Rating`]s and
//! [`service_order::ServiceSongEntry`]s.

pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod ranking;
pub mod rating;
pub mod rotation;
pub mod service_order;
pub mod song;
pub mod usage;

pub use error::{Error, Result};
