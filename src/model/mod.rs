//! Core data types for watchlists, classifications, and scan reports.
//!
//! - [`WatchlistEntry`] / [`Watchlist`] - compromised `(package, version)` pairs
//! - [`Classification`] - how one entry relates to one lockfile
//! - [`FileOutcome`] - everything one lockfile contributed
//! - [`ScanReport`] - accumulated state across all lockfiles
//!
//! # Example
//!
//! ```
//! use lockwatch::{ScanReport, Severity, Watchlist};
//!
//! let watchlist = Watchlist::embedded();
//! let report = ScanReport::new(watchlist.len());
//!
//! assert_eq!(report.severity(), Severity::Clean);
//! ```

mod report;
mod watchlist;

pub use report::*;
pub use watchlist::*;
