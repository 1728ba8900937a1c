use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the I/O-facing parts of the crate (scanning, snapshots,
/// application fonts). Matching and cache lookups never fail with an error.
#[derive(Debug, Error)]
pub enum FontError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("Error parsing font {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Registry snapshot error: {0}")]
    Snapshot(String),

    #[error("Registry snapshot has version {found}, expected {expected}")]
    SnapshotVersion { found: u32, expected: u32 },

    #[error("No application font with id {0}")]
    UnknownApplicationFont(usize),

    #[error("No font directories found on this system")]
    NoFontDirectories,
}
