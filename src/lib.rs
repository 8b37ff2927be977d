pub mod bundle;
pub mod checker;
pub mod config;
pub mod discovery;
pub mod error;
pub mod lockfile;
pub mod model;
pub mod output;
pub mod overrides;
pub mod remediate;
pub mod scan;

pub use config::Config;
pub use error::{ExtractError, WatchlistError};
pub use model::{
    Classification, FileOutcome, Finding, ScanReport, Severity, Watchlist, WatchlistEntry,
};
pub use scan::LockfileScanner;
