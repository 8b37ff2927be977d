use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::WatchlistError;

/// Built-in list of compromised package versions.
const EMBEDDED_WATCHLIST: &str = include_str!("../../data/compromised-packages.txt");

/// A single compromised `(package, version)` pair.
///
/// Both fields are trimmed and non-empty. Entries order by name, then version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub name: String,
    pub version: String,
}

impl WatchlistEntry {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parses one `name@version` line.
    ///
    /// The split happens on the last `@`, so scoped names such as
    /// `@scope/pkg@1.0.0` keep their leading `@`. Returns `None` for blank
    /// lines, `#` comments, and lines that do not yield two non-empty parts.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (name, version) = line.rsplit_once('@')?;
        let (name, version) = (name.trim(), version.trim());
        if name.is_empty() || version.is_empty() {
            return None;
        }

        Some(Self::new(name, version))
    }
}

impl std::fmt::Display for WatchlistEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A deduplicated, sorted set of [`WatchlistEntry`] values.
///
/// # Example
///
/// ```
/// use lockwatch::Watchlist;
///
/// let watchlist = Watchlist::parse("debug@4.4.2\n# comment\ndebug@4.4.2\n");
/// assert_eq!(watchlist.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Watchlist {
    entries: BTreeSet<WatchlistEntry>,
}

impl Watchlist {
    /// Parses watchlist text, silently dropping malformed lines.
    pub fn parse(content: &str) -> Self {
        let mut watchlist = Self::default();
        watchlist.extend_lines(content.lines());
        watchlist
    }

    /// Returns the built-in watchlist.
    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_WATCHLIST)
    }

    /// Reads a user-supplied watchlist file.
    ///
    /// # Errors
    ///
    /// Returns [`WatchlistError::NotFound`] if the path does not exist and
    /// [`WatchlistError::Read`] if it cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, WatchlistError> {
        if !path.exists() {
            return Err(WatchlistError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| WatchlistError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Loads the user file when a path is given, the built-in list otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, WatchlistError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::embedded()),
        }
    }

    /// Adds every well-formed `name@version` line.
    pub fn extend_lines<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            match WatchlistEntry::parse(line) {
                Some(entry) => {
                    self.entries.insert(entry);
                }
                None => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with('#') {
                        tracing::debug!(line = trimmed, "skipping malformed watchlist entry");
                    }
                }
            }
        }
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&WatchlistEntry) -> bool) {
        self.entries.retain(keep);
    }

    pub fn iter(&self) -> btree_set::Iter<'_, WatchlistEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups compromised versions by package name.
    pub fn by_package(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for entry in &self.entries {
            grouped
                .entry(entry.name.as_str())
                .or_default()
                .push(entry.version.as_str());
        }
        grouped
    }
}

impl<'a> IntoIterator for &'a Watchlist {
    type Item = &'a WatchlistEntry;
    type IntoIter = btree_set::Iter<'a, WatchlistEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
