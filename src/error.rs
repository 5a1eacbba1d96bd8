//! Error taxonomy shared by the analytics core and the SQLite store.
//!
//! The core computations are total functions; the only failure mode they own
//! is malformed input (`Validation`). The store adds `Conflict` for
//! optimistic-concurrency misses and `NotFound` for caller bugs referencing
//! unknown ids. Conflicts are surfaced for the caller to retry with a fresh
//! snapshot, never merged silently.

use thiserror::Error;

/// All errors produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: invalid reorder permutation, out-of-range config,
    /// duplicate usage fact. Rejected with no partial mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Concurrent modification detected (version mismatch). The caller should
    /// reload and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A song, service or rating referenced by id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying SQLite failure.
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
