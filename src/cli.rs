//! Command-line interface definitions.
//!
//! Uses Clap derive macros for type-safe argument parsing. The CLI is a thin
//! consumer of the library: every command maps onto one store call plus one
//! pure computation. Dates are ISO (`YYYY-MM-DD`); the tenant defaults to 1
//! for single-congregation installs and can be set explicitly everywhere.
//!
//! ## Examples
//!
//! ```bash
//! setlist init-db
//! setlist add-song "Amazing Grace" --artist "John Newton" --key G --duration 260
//! setlist record-usage 1 --service 3 --date 2024-05-05
//! setlist top --days 90 --limit 10
//! setlist reorder 3 4 1 2
//! ```

use crate::rating::RatingValue;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Parse an ISO `YYYY-MM-DD` date argument.
fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{raw}', expected YYYY-MM-DD: {e}"))
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "setlist")]
#[command(about = "Setlist: song usage & rotation analytics for worship service planning")]
#[command(version)]
pub struct Args {
    /// Use this database file instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Rating values as written on the command line.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum RatingArg {
    Up,
    Neutral,
    Down,
}

impl From<RatingArg> for RatingValue {
    fn from(arg: RatingArg) -> Self {
        match arg {
            RatingArg::Up => RatingValue::Up,
            RatingArg::Neutral => RatingValue::Neutral,
            RatingArg::Down => RatingValue::Down,
        }
    }
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Initialize the planning database schema
    ///
    /// Creates all tables if they do not exist. With --force the database is
    /// dropped and recreated, losing all data.
    InitDb {
        /// Drop and recreate existing tables
        #[arg(long)]
        force: bool,
    },

    /// Add a song to the library
    AddSong {
        /// Song title
        title: String,

        /// Artist or author
        #[arg(long, default_value = "")]
        artist: String,

        /// Musical key as written, e.g. G or Em
        #[arg(long, default_value = "")]
        key: String,

        /// Tempo in beats per minute
        #[arg(long)]
        tempo: Option<u32>,

        /// Nominal duration in seconds
        #[arg(long)]
        duration: Option<u32>,

        /// Tenant the song belongs to
        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// List the library with rotation status badges
    ///
    /// Shows every song with its last-used date and the freshness badge
    /// derived from the tenant's rotation window (recent / caution /
    /// available / never used).
    List {
        /// Tenant to list
        #[arg(long, default_value_t = 1)]
        tenant: i64,

        /// Classify as of this date instead of today
        #[arg(long, value_parser = parse_date)]
        on: Option<NaiveDate>,
    },

    /// Soft-retire a song (it stays in the library, history keeps resolving)
    Retire {
        /// Song id
        song: i64,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Create a service (setlist) for a date; prints the new service id
    NewService {
        /// Service date (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        date: NaiveDate,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Append a song to the end of a service
    AddEntry {
        /// Service id
        service: i64,

        /// Song id
        song: i64,

        /// Section of the service, e.g. praise or communion
        #[arg(long, default_value = "")]
        section: String,

        /// Transposed key for this service, if different from the song's
        #[arg(long)]
        key: Option<String>,

        /// Duration override in seconds for this service
        #[arg(long)]
        duration: Option<u32>,
    },

    /// Reorder a service's songs atomically
    ///
    /// The id list must mention every song in the service exactly once;
    /// anything else is rejected and the stored order is left unchanged.
    /// On a concurrent edit the command reports the conflict so it can be
    /// re-run against the fresh order.
    Reorder {
        /// Service id
        service: i64,

        /// Song ids in the desired order
        #[arg(required = false)]
        order: Vec<i64>,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Delete a service, cascading to its entries and usage facts
    DeleteService {
        /// Service id
        service: i64,
    },

    /// Record that a song was used in a service on a date
    ///
    /// Appends one immutable fact to the usage ledger. Recording the same
    /// song for the same service twice is rejected.
    RecordUsage {
        /// Song id
        song: i64,

        /// Service id
        #[arg(long)]
        service: i64,

        /// Date the service occurred (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,

        /// Slot the song held within the service
        #[arg(long, default_value_t = 0)]
        slot: u32,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Top songs by usage over a rolling period, with trends
    ///
    /// Ranks songs used in the last N days and compares against the
    /// preceding N days: new entries, climbs and drops are marked per row.
    Top {
        /// Period length in days
        #[arg(long, default_value_t = 90)]
        days: u32,

        /// Maximum number of rows
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// End the period at this date instead of today (exclusive)
        #[arg(long, value_parser = parse_date)]
        on: Option<NaiveDate>,

        /// Print the ranking as JSON instead of a table
        #[arg(long)]
        json: bool,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Rate a song as a member (repeat the same rating to remove it)
    Rate {
        /// Song id
        song: i64,

        /// Rating member id
        #[arg(long)]
        member: i64,

        /// Thumbs up, neutral, or thumbs down
        value: RatingArg,

        /// Also flag the song as difficult to play or sing
        #[arg(long)]
        difficult: bool,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Show a song's rating summary and the auto-retire verdict
    Ratings {
        /// Song id
        song: i64,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Set the tenant's rotation window
    SetRotation {
        /// Days a song should rest before it is fully available again
        days: u32,

        /// Fraction of the window that counts as "recently used" (0..1]
        #[arg(long)]
        recent_fraction: Option<f64>,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Set the tenant's auto-retire thresholds
    SetRetirePolicy {
        /// Minimum ratings before the signal can fire
        #[arg(long, default_value_t = 3)]
        min_samples: u32,

        /// Share of thumbs-down ratings that triggers the signal (0..1]
        #[arg(long, default_value_t = 0.6)]
        down_ratio: f64,

        #[arg(long, default_value_t = 1)]
        tenant: i64,
    },

    /// Generate shell completions
    ///
    /// Usage: setlist completion bash > ~/.local/share/bash-completion/completions/setlist
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
