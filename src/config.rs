//! Configuration and data directory management.
//!
//! The planning database lives in the platform-standard data directory:
//! - Linux: `~/.local/share/setlist/`
//! - macOS: `~/Library/Application Support/setlist/`
//! - Windows: `%APPDATA%\setlist\`
//!
//! Tenant-level knobs (rotation window, retire thresholds) live inside the
//! database itself, per tenant; this module only locates the file.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Returns the platform-appropriate database file path, creating the
/// `setlist` data subdirectory if needed.
///
/// # Errors
///
/// Fails when the system data directory cannot be determined or the
/// subdirectory cannot be created.
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("planning.db"))
}

/// Returns the `setlist` data directory itself, creating it if needed.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system data directory."))?;

    let setlist_dir = data_dir.join("setlist");
    fs::create_dir_all(&setlist_dir).with_context(|| {
        format!(
            "Failed to create Setlist data directory at {}. Please check file permissions.",
            setlist_dir.display()
        )
    })?;

    Ok(setlist_dir)
}

/// Configuration for runtime behavior.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Path to the database file.
    pub db_path: PathBuf,
}

impl RuntimeConfig {
    /// Resolve the database path: an explicit override wins, otherwise the
    /// platform default.
    pub fn resolve(override_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match override_path {
            Some(path) => path,
            None => get_db_path()?,
        };
        Ok(Self { db_path })
    }
}
