//! Error types.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - [`WatchlistError`] is an invocation-time failure. The scan never starts.
//! - [`ExtractError`] belongs to a single lockfile. It is recorded against that
//!   file and the scan moves on to the next one.

use std::path::PathBuf;

use crate::lockfile::Dialect;

/// Failure to load a user-supplied watchlist.
#[derive(Debug, thiserror::Error)]
pub enum WatchlistError {
    #[error("watchlist file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read watchlist {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to determine the versions recorded in one lockfile.
///
/// This is never the same thing as "no compromised packages found".
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot parse {dialect} lockfile: {reason}")]
    Parse { dialect: Dialect, reason: String },

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lockfile is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: u64, max: u64 },
}
