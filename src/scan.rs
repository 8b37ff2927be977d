//! The scan loop.
//!
//! Every discovered lockfile is read, extracted and checked on its own. The
//! per-file outcomes are then folded into a [`ScanReport`] in discovery order,
//! so a concurrent scan reports exactly what a sequential one would.

use futures::future::join_all;
use indicatif::ProgressBar;

use crate::checker::LockfileChecker;
use crate::discovery::DiscoveredLockfile;
use crate::error::ExtractError;
use crate::model::{FileError, FileOutcome, ScanReport, Watchlist};

/// Default upper bound on the size of a single lockfile.
pub const DEFAULT_MAX_LOCKFILE_BYTES: u64 = 64 * 1024 * 1024;

/// Scans lockfiles against a watchlist.
///
/// # Example
///
/// ```no_run
/// use indicatif::ProgressBar;
/// use lockwatch::discovery::LockfileDiscovery;
/// use lockwatch::scan::LockfileScanner;
/// use lockwatch::Watchlist;
///
/// #[tokio::main]
/// async fn main() {
///     let lockfiles = LockfileDiscovery::default().discover(&[".".into()]);
///     let scanner = LockfileScanner::new(Watchlist::embedded());
///
///     let report = scanner.scan(&lockfiles, true, &ProgressBar::hidden()).await;
///     println!("exit code {}", report.severity().exit_code());
/// }
/// ```
pub struct LockfileScanner {
    watchlist: Watchlist,
    max_lockfile_bytes: u64,
}

impl LockfileScanner {
    pub fn new(watchlist: Watchlist) -> Self {
        Self {
            watchlist,
            max_lockfile_bytes: DEFAULT_MAX_LOCKFILE_BYTES,
        }
    }

    pub fn with_max_lockfile_bytes(mut self, max: u64) -> Self {
        self.max_lockfile_bytes = max;
        self
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    /// Reads and checks a single lockfile.
    pub async fn scan_file(&self, lockfile: &DiscoveredLockfile) -> Result<FileOutcome, FileError> {
        let to_file_error = |e: ExtractError| FileError {
            lockfile: lockfile.path.clone(),
            message: e.to_string(),
        };

        let content = self.read(lockfile).await.map_err(to_file_error)?;
        LockfileChecker::new(&self.watchlist)
            .check(&lockfile.path, lockfile.dialect, &content)
            .map_err(to_file_error)
    }

    async fn read(&self, lockfile: &DiscoveredLockfile) -> Result<String, ExtractError> {
        let read_error = |source: std::io::Error| ExtractError::Read {
            path: lockfile.path.clone(),
            source,
        };

        let size = tokio::fs::metadata(&lockfile.path)
            .await
            .map_err(read_error)?
            .len();
        if size > self.max_lockfile_bytes {
            return Err(ExtractError::TooLarge {
                size,
                max: self.max_lockfile_bytes,
            });
        }

        tokio::fs::read_to_string(&lockfile.path)
            .await
            .map_err(read_error)
    }

    /// Scans every lockfile and folds the outcomes into a report.
    pub async fn scan(
        &self,
        lockfiles: &[DiscoveredLockfile],
        parallel: bool,
        progress: &ProgressBar,
    ) -> ScanReport {
        let results = if parallel && lockfiles.len() > 1 {
            self.scan_concurrent(lockfiles, progress).await
        } else {
            self.scan_sequential(lockfiles, progress).await
        };

        let mut report = ScanReport::new(self.watchlist.len());
        for result in results {
            match result {
                Ok(outcome) => {
                    if outcome.flagged() {
                        tracing::info!(
                            path = %outcome.lockfile.display(),
                            findings = outcome.findings.len(),
                            exact = outcome.exact_hit(),
                            "lockfile flagged"
                        );
                    }
                    report.record(outcome);
                }
                Err(error) => {
                    tracing::warn!(
                        path = %error.lockfile.display(),
                        error = %error.message,
                        "cannot determine lockfile versions"
                    );
                    report.record_error(error);
                }
            }
        }

        report
    }

    async fn scan_sequential(
        &self,
        lockfiles: &[DiscoveredLockfile],
        progress: &ProgressBar,
    ) -> Vec<Result<FileOutcome, FileError>> {
        let mut results = Vec::with_capacity(lockfiles.len());
        for lockfile in lockfiles {
            progress.set_message(format!("Scanning {}...", lockfile.path.display()));
            results.push(self.scan_file(lockfile).await);
            progress.inc(1);
        }
        results
    }

    async fn scan_concurrent(
        &self,
        lockfiles: &[DiscoveredLockfile],
        progress: &ProgressBar,
    ) -> Vec<Result<FileOutcome, FileError>> {
        let futures = lockfiles.iter().map(|lockfile| async move {
            let result = self.scan_file(lockfile).await;
            progress.inc(1);
            result
        });

        // join_all keeps input order
        join_all(futures).await
    }
}
