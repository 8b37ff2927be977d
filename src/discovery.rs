//! Lockfile discovery.
//!
//! Walks each scan root in file-name order and yields every file whose name
//! maps to a known [`Dialect`]. Directories named in the skip list (by default
//! `node_modules` and `.git`) are never descended into.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::lockfile::Dialect;

/// A lockfile found on disk, tagged with its dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLockfile {
    pub path: PathBuf,
    pub dialect: Dialect,
}

pub struct LockfileDiscovery {
    skip_dirs: Vec<String>,
}

impl LockfileDiscovery {
    pub fn new(skip_dirs: Vec<String>) -> Self {
        Self { skip_dirs }
    }

    /// Finds lockfiles under every root, in discovery order, without duplicates.
    ///
    /// A root may also point directly at a lockfile.
    pub fn discover(&self, roots: &[PathBuf]) -> Vec<DiscoveredLockfile> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for root in roots {
            if !root.exists() {
                tracing::warn!(root = %root.display(), "scan root does not exist");
                continue;
            }

            let walker = WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !self.is_skipped(entry));

            for entry in walker {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read directory entry");
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                let Some(dialect) = Dialect::from_path(entry.path()) else {
                    continue;
                };

                if seen.insert(entry.path().to_path_buf()) {
                    tracing::debug!(path = %entry.path().display(), %dialect, "found lockfile");
                    found.push(DiscoveredLockfile {
                        path: entry.into_path(),
                        dialect,
                    });
                }
            }
        }

        found
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.skip_dirs.iter().any(|skip| skip == name))
    }

    /// Dialects of the lockfiles sitting directly in `dir`.
    pub fn lockfiles_in(dir: &Path) -> Vec<Dialect> {
        crate::lockfile::LOCKFILE_NAMES
            .iter()
            .filter(|(name, _)| dir.join(name).is_file())
            .map(|(_, dialect)| *dialect)
            .collect()
    }
}

impl Default for LockfileDiscovery {
    fn default() -> Self {
        Self::new(vec!["node_modules".to_string(), ".git".to_string()])
    }
}
