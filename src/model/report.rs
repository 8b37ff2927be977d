use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::WatchlistEntry;
use crate::lockfile::Dialect;

/// Outcome of checking one watchlist entry against one lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "versions", rename_all = "snake_case")]
pub enum Classification {
    /// The compromised version itself is locked.
    ExactMatch(String),
    /// The package is locked, but only at other versions. An empty list means
    /// the package is present and no version could be extracted.
    VersionMismatch(Vec<String>),
    Absent,
}

impl Classification {
    pub fn is_absent(&self) -> bool {
        matches!(self, Classification::Absent)
    }

    /// Comma-joined found versions, or `version unknown`.
    pub fn found_versions(&self) -> String {
        match self {
            Classification::ExactMatch(version) => version.clone(),
            Classification::VersionMismatch(versions) if versions.is_empty() => {
                "version unknown".to_string()
            }
            Classification::VersionMismatch(versions) => versions.join(", "),
            Classification::Absent => String::new(),
        }
    }
}

/// A non-absent classification tied to the lockfile it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub lockfile: PathBuf,
    pub entry: WatchlistEntry,
    pub classification: Classification,
}

impl Finding {
    pub fn is_exact(&self) -> bool {
        matches!(self.classification, Classification::ExactMatch(_))
    }
}

/// Everything one lockfile contributed to a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub lockfile: PathBuf,
    pub dialect: Dialect,
    pub findings: Vec<Finding>,
}

impl FileOutcome {
    pub fn exact_hit(&self) -> bool {
        self.findings.iter().any(Finding::is_exact)
    }

    pub fn warn_hit(&self) -> bool {
        self.findings.iter().any(|f| !f.is_exact())
    }

    pub fn flagged(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// A lockfile whose versions could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub lockfile: PathBuf,
    pub message: String,
}

/// A known payload marker found in a built JavaScript file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleHit {
    pub file: PathBuf,
    pub marker: String,
    pub line: usize,
}

/// Overall classification of a scan, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Clean,
    Warning,
    Exact,
}

impl Severity {
    pub fn exit_code(self) -> u8 {
        match self {
            Severity::Clean => 0,
            Severity::Warning => 8,
            Severity::Exact => 10,
        }
    }
}

/// Accumulated state of a scan across all lockfiles.
///
/// `found_any` and `warn_any` only ever go from false to true.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_time: DateTime<Utc>,
    pub watchlist_size: usize,
    pub lockfiles_scanned: usize,
    pub findings: Vec<Finding>,
    pub errors: Vec<FileError>,
    pub bundle_hits: Vec<BundleHit>,
    pub found_any: bool,
    pub warn_any: bool,
    pub affected_dirs: BTreeSet<PathBuf>,
}

impl ScanReport {
    pub fn new(watchlist_size: usize) -> Self {
        Self {
            scan_time: Utc::now(),
            watchlist_size,
            lockfiles_scanned: 0,
            findings: Vec::new(),
            errors: Vec::new(),
            bundle_hits: Vec::new(),
            found_any: false,
            warn_any: false,
            affected_dirs: BTreeSet::new(),
        }
    }

    /// Folds one lockfile's outcome into the report.
    pub fn record(&mut self, outcome: FileOutcome) {
        self.lockfiles_scanned += 1;

        if outcome.exact_hit() {
            self.found_any = true;
        }
        if outcome.warn_hit() {
            self.warn_any = true;
        }
        if outcome.flagged() {
            self.affected_dirs.insert(containing_dir(&outcome.lockfile));
        }

        self.findings.extend(outcome.findings);
    }

    /// Records a lockfile that could not be read or parsed.
    pub fn record_error(&mut self, error: FileError) {
        self.lockfiles_scanned += 1;
        self.errors.push(error);
    }

    pub fn record_bundle_hits(&mut self, hits: impl IntoIterator<Item = BundleHit>) {
        self.bundle_hits.extend(hits);
    }

    /// Exact matches outrank warnings, which outrank a clean scan.
    ///
    /// Unreadable lockfiles and bundle hits count as warnings, so a scan that
    /// could not see everything never reports clean.
    pub fn severity(&self) -> Severity {
        if self.found_any {
            Severity::Exact
        } else if self.warn_any || !self.errors.is_empty() || !self.bundle_hits.is_empty() {
            Severity::Warning
        } else {
            Severity::Clean
        }
    }

    pub fn exact_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_exact())
    }

    pub fn mismatch_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_exact())
    }
}

/// Absolute path of the directory holding `lockfile`.
fn containing_dir(lockfile: &Path) -> PathBuf {
    let parent = match lockfile.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::path::absolute(parent).unwrap_or_else(|_| parent.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(lockfile: &str, classifications: Vec<Classification>) -> FileOutcome {
        FileOutcome {
            lockfile: PathBuf::from(lockfile),
            dialect: Dialect::Npm,
            findings: classifications
                .into_iter()
                .map(|classification| Finding {
                    lockfile: PathBuf::from(lockfile),
                    entry: WatchlistEntry::new("debug", "4.4.2"),
                    classification,
                })
                .collect(),
        }
    }

    #[test]
    fn test_clean_report() {
        let mut report = ScanReport::new(18);
        report.record(outcome("/a/package-lock.json", vec![]));

        assert_eq!(report.lockfiles_scanned, 1);
        assert!(report.affected_dirs.is_empty());
        assert_eq!(report.severity(), Severity::Clean);
        assert_eq!(report.severity().exit_code(), 0);
    }

    #[test]
    fn test_exact_outranks_warning() {
        let mut report = ScanReport::new(18);
        report.record(outcome(
            "/a/package-lock.json",
            vec![Classification::VersionMismatch(vec!["4.4.1".into()])],
        ));
        assert_eq!(report.severity(), Severity::Warning);

        report.record(outcome(
            "/b/yarn.lock",
            vec![Classification::ExactMatch("4.4.2".into())],
        ));
        report.record(outcome(
            "/c/yarn.lock",
            vec![Classification::VersionMismatch(vec!["4.3.0".into()])],
        ));

        assert!(report.found_any);
        assert!(report.warn_any);
        assert_eq!(report.severity(), Severity::Exact);
        assert_eq!(report.severity().exit_code(), 10);
    }

    #[test]
    fn test_flags_are_monotonic() {
        let mut report = ScanReport::new(18);
        report.record(outcome(
            "/a/package-lock.json",
            vec![Classification::ExactMatch("4.4.2".into())],
        ));
        report.record(outcome("/b/package-lock.json", vec![]));

        assert!(report.found_any);
        assert_eq!(report.severity(), Severity::Exact);
    }

    #[test]
    fn test_affected_dirs_deduplicated() {
        let mut report = ScanReport::new(18);
        report.record(outcome(
            "/proj/package-lock.json",
            vec![Classification::ExactMatch("4.4.2".into())],
        ));
        report.record(outcome(
            "/proj/yarn.lock",
            vec![Classification::VersionMismatch(vec![])],
        ));
        report.record(outcome("/other/yarn.lock", vec![]));

        assert_eq!(report.affected_dirs.len(), 1);
        assert!(report.affected_dirs.contains(Path::new("/proj")));
    }

    #[test]
    fn test_relative_lockfile_dir_is_absolute() {
        let dir = containing_dir(Path::new("package-lock.json"));
        assert!(dir.is_absolute());
    }

    #[test]
    fn test_file_error_is_not_clean() {
        let mut report = ScanReport::new(18);
        report.record_error(FileError {
            lockfile: PathBuf::from("/a/package-lock.json"),
            message: "cannot parse npm lockfile".into(),
        });

        assert!(!report.found_any);
        assert!(!report.warn_any);
        assert_eq!(report.severity(), Severity::Warning);
    }

    #[test]
    fn test_found_versions_rendering() {
        assert_eq!(
            Classification::VersionMismatch(vec!["1.0.0".into(), "1.2.0".into()]).found_versions(),
            "1.0.0, 1.2.0"
        );
        assert_eq!(
            Classification::VersionMismatch(vec![]).found_versions(),
            "version unknown"
        );
    }
}
