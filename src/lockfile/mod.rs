//! Lockfile dialects and version extraction.
//!
//! Each supported lockfile is reduced to the set of versions locked for a
//! given package name. Which extractor runs is decided by the file name:
//!
//! | File | Dialect | Extractor |
//! |------|---------|-----------|
//! | `package-lock.json`, `npm-shrinkwrap.json` | [`Dialect::Npm`] | structured JSON walk |
//! | `yarn.lock` | [`Dialect::Yarn`] | header/`version` blocks, queried per name |
//! | `pnpm-lock.yaml` | [`Dialect::Pnpm`] | `/<name>@<version>:` mapping keys |
//!
//! # Example
//!
//! ```
//! use lockwatch::lockfile::Dialect;
//!
//! let lock = r#"{ "packages": { "node_modules/debug": { "version": "4.4.2" } } }"#;
//! let parsed = Dialect::Npm.parse(lock).unwrap();
//!
//! let versions = parsed.versions("debug").unwrap();
//! assert!(versions.contains("4.4.2"));
//! ```

mod npm;
mod pnpm;
mod yarn;

pub use yarn::YarnLock;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::ExtractError;

/// Known lockfile names and the dialect each one is written in.
pub const LOCKFILE_NAMES: &[(&str, Dialect)] = &[
    ("package-lock.json", Dialect::Npm),
    ("npm-shrinkwrap.json", Dialect::Npm),
    ("yarn.lock", Dialect::Yarn),
    ("pnpm-lock.yaml", Dialect::Pnpm),
];

/// Structural format of a lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Npm,
    Yarn,
    Pnpm,
}

impl Dialect {
    /// Detects the dialect from the file name alone.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        LOCKFILE_NAMES
            .iter()
            .find(|(name, _)| *name == file_name)
            .map(|(_, dialect)| *dialect)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Npm => "npm",
            Dialect::Yarn => "yarn",
            Dialect::Pnpm => "pnpm",
        }
    }

    /// Extracts lockfile content in this dialect.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Parse`] when the content does not have the
    /// dialect's shape, including unresolved merge conflict markers.
    pub fn parse(self, content: &str) -> Result<ParsedLockfile<'_>, ExtractError> {
        if has_conflict_markers(content) {
            return Err(ExtractError::Parse {
                dialect: self,
                reason: "unresolved merge conflict markers".to_string(),
            });
        }

        match self {
            Dialect::Npm => npm::extract(content).map(ParsedLockfile::Indexed),
            Dialect::Pnpm => pnpm::extract(content).map(ParsedLockfile::Indexed),
            Dialect::Yarn => Ok(ParsedLockfile::Yarn(YarnLock::new(content))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_conflict_markers(content: &str) -> bool {
    content
        .lines()
        .any(|line| line.starts_with("<<<<<<< ") || line.starts_with(">>>>>>> "))
}

/// Package name to the distinct versions locked for it in one file.
///
/// A name mapped to an empty set is present, but no version could be
/// extracted for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockfileIndex {
    packages: BTreeMap<String, BTreeSet<String>>,
}

impl LockfileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name` at `version`. Empty versions only mark the name present.
    pub fn insert(&mut self, name: &str, version: &str) {
        let versions = self.packages.entry(name.to_string()).or_default();
        if !version.is_empty() {
            versions.insert(version.to_string());
        }
    }

    pub fn mark_present(&mut self, name: &str) {
        self.packages.entry(name.to_string()).or_default();
    }

    pub fn versions(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.packages.get(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Extracted content of one lockfile, ready to be queried by package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLockfile<'a> {
    Indexed(LockfileIndex),
    Yarn(YarnLock<'a>),
}

impl ParsedLockfile<'_> {
    /// Versions locked for `name`, or `None` when the package is absent.
    pub fn versions(&self, name: &str) -> Option<BTreeSet<String>> {
        match self {
            ParsedLockfile::Indexed(index) => index.versions(name).cloned(),
            ParsedLockfile::Yarn(lock) => lock.versions(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_path() {
        assert_eq!(
            Dialect::from_path(Path::new("/p/package-lock.json")),
            Some(Dialect::Npm)
        );
        assert_eq!(
            Dialect::from_path(Path::new("npm-shrinkwrap.json")),
            Some(Dialect::Npm)
        );
        assert_eq!(Dialect::from_path(Path::new("/p/yarn.lock")), Some(Dialect::Yarn));
        assert_eq!(
            Dialect::from_path(Path::new("/p/pnpm-lock.yaml")),
            Some(Dialect::Pnpm)
        );
        assert_eq!(Dialect::from_path(Path::new("/p/package.json")), None);
        assert_eq!(Dialect::from_path(Path::new("/p/Cargo.lock")), None);
    }

    #[test]
    fn test_index_insert_and_presence() {
        let mut index = LockfileIndex::new();
        index.insert("debug", "4.4.2");
        index.insert("debug", "4.4.2");
        index.insert("debug", "2.6.9");
        index.insert("linked", "");

        assert_eq!(index.len(), 2);
        assert_eq!(index.versions("debug").unwrap().len(), 2);
        assert!(index.versions("linked").unwrap().is_empty());
        assert!(index.versions("chalk").is_none());
    }

    #[test]
    fn test_conflict_markers_are_parse_errors() {
        let content = "<<<<<<< HEAD\nchalk@^5.0.0:\n  version \"5.6.1\"\n=======\n>>>>>>> branch\n";
        for dialect in [Dialect::Npm, Dialect::Yarn, Dialect::Pnpm] {
            let err = dialect.parse(content).unwrap_err();
            assert!(matches!(err, ExtractError::Parse { .. }));
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let content = r#"{
            "packages": {
                "node_modules/debug": { "version": "4.4.2" },
                "node_modules/a/node_modules/debug": { "version": "2.6.9" }
            }
        }"#;
        let first = Dialect::Npm.parse(content).unwrap();
        let second = Dialect::Npm.parse(content).unwrap();
        assert_eq!(first, second);
    }
}
