//! Matching lockfile contents against the watchlist.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ExtractError;
use crate::lockfile::{Dialect, ParsedLockfile};
use crate::model::{Classification, FileOutcome, Finding, Watchlist, WatchlistEntry};

/// Classifies one watchlist entry against one extracted lockfile.
///
/// # Example
///
/// ```
/// use lockwatch::checker::classify;
/// use lockwatch::lockfile::Dialect;
/// use lockwatch::{Classification, WatchlistEntry};
///
/// let lock = Dialect::Yarn.parse("chalk@^5.0.0, chalk@^5.6.0:\n  version \"5.6.1\"\n").unwrap();
/// let entry = WatchlistEntry::new("chalk", "5.6.1");
///
/// assert_eq!(classify(&lock, &entry), Classification::ExactMatch("5.6.1".into()));
/// ```
pub fn classify(lockfile: &ParsedLockfile<'_>, entry: &WatchlistEntry) -> Classification {
    match lockfile.versions(&entry.name) {
        None => Classification::Absent,
        Some(versions) if versions.contains(&entry.version) => {
            Classification::ExactMatch(entry.version.clone())
        }
        Some(versions) => Classification::VersionMismatch(versions.into_iter().collect()),
    }
}

/// Checks lockfile contents against a watchlist.
pub struct LockfileChecker<'w> {
    watchlist: &'w Watchlist,
}

impl<'w> LockfileChecker<'w> {
    pub fn new(watchlist: &'w Watchlist) -> Self {
        Self { watchlist }
    }

    /// Extracts `content` in `dialect` and classifies every watchlist entry.
    ///
    /// Absent entries produce no finding. When a package is locked at one of
    /// its compromised versions, its other watchlist entries are not also
    /// reported as mismatches for this file.
    ///
    /// # Errors
    ///
    /// Returns the extraction error if the content cannot be parsed.
    pub fn check(
        &self,
        lockfile: &Path,
        dialect: Dialect,
        content: &str,
    ) -> Result<FileOutcome, ExtractError> {
        let parsed = dialect.parse(content)?;

        let classified: Vec<(&WatchlistEntry, Classification)> = self
            .watchlist
            .iter()
            .map(|entry| (entry, classify(&parsed, entry)))
            .filter(|(_, classification)| !classification.is_absent())
            .collect();

        let exact_packages: BTreeSet<&str> = classified
            .iter()
            .filter(|(_, c)| matches!(c, Classification::ExactMatch(_)))
            .map(|(entry, _)| entry.name.as_str())
            .collect();

        let findings = classified
            .into_iter()
            .filter(|(entry, classification)| {
                matches!(classification, Classification::ExactMatch(_))
                    || !exact_packages.contains(entry.name.as_str())
            })
            .map(|(entry, classification)| Finding {
                lockfile: lockfile.to_path_buf(),
                entry: entry.clone(),
                classification,
            })
            .collect();

        Ok(FileOutcome {
            lockfile: lockfile.to_path_buf(),
            dialect,
            findings,
        })
    }
}
