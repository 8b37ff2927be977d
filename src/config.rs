//! `config.toml` handling.
//!
//! The file lives in the platform config directory (`~/.config/lockwatch/`
//! on Linux, `~/Library/Application Support/lockwatch/` on macOS,
//! `%APPDATA%\lockwatch\` on Windows). Every key is optional:
//!
//! ```toml
//! watchlist = "/etc/lockwatch/compromised-packages.txt"
//! extra_packages = ["@ctrl/tinycolor@4.1.1"]
//! default_format = "json"
//! parallel = false
//! skip_dirs = ["node_modules", ".git", "vendor"]
//!
//! [ignore]
//! packages = ["debug", "color*"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Watchlist;
use crate::scan::DEFAULT_MAX_LOCKFILE_BYTES;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watchlist file used when `--watchlist` is not given. The built-in list
    /// is used when this is unset too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchlist: Option<PathBuf>,

    /// `name@version` lines added on top of the watchlist.
    pub extra_packages: Vec<String>,

    /// `table` or `json`.
    pub default_format: String,

    pub parallel: bool,

    /// Lockfiles over this size are reported as unreadable.
    pub max_lockfile_bytes: u64,

    /// Directory names discovery never descends into.
    pub skip_dirs: Vec<String>,

    /// Build output directories searched by `scan --bundles`.
    pub bundle_dirs: Vec<String>,

    pub ignore: IgnoreConfig,
}

/// Watchlist packages to leave out of a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names; `*` matches any run of characters.
    pub packages: Vec<String>,
}

impl IgnoreConfig {
    pub fn is_ignored(&self, package: &str) -> bool {
        self.packages
            .iter()
            .any(|pattern| wildcard_match(pattern, package))
    }
}

/// `*`-only wildcard match over the whole of `name`.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let mut pieces = pattern.split('*');
    let first = pieces.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = pieces.collect();
    let Some((last, middle)) = pieces.split_last() else {
        // no `*` at all
        return rest.is_empty();
    };

    for piece in middle {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watchlist: None,
            extra_packages: Vec::new(),
            default_format: "table".to_string(),
            parallel: true,
            max_lockfile_bytes: DEFAULT_MAX_LOCKFILE_BYTES,
            skip_dirs: ["node_modules", ".git"].map(String::from).to_vec(),
            bundle_dirs: ["dist", "build", ".next", "out"].map(String::from).to_vec(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Reads the user's config file, or defaults when there is none.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// ```
    /// assert!(lockwatch::Config::config_path().ends_with("lockwatch/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lockwatch")
            .join("config.toml")
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    /// Adds `extra_packages` to `watchlist`, then drops ignored packages.
    pub fn apply_to(&self, watchlist: &mut Watchlist) {
        watchlist.extend_lines(self.extra_packages.iter().map(String::as_str));
        watchlist.retain(|entry| !self.ignore.is_ignored(&entry.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ignore_patterns() {
        let ignore = IgnoreConfig {
            packages: vec![
                "debug".to_string(),
                "color*".to_string(),
                "*-ansi".to_string(),
                "@ctrl/*".to_string(),
            ],
        };

        for ignored in ["debug", "color", "color-convert", "strip-ansi", "@ctrl/tinycolor"] {
            assert!(ignore.is_ignored(ignored), "{ignored}");
        }
        for kept in ["debug-fork", "supports-color", "ansi-styles", "@babel/core", "chalk"] {
            assert!(!ignore.is_ignored(kept), "{kept}");
        }
    }

    #[test]
    fn test_wildcard_middle() {
        assert!(wildcard_match("a*b*c", "a-x-b-y-c"));
        assert!(!wildcard_match("a*b*c", "a-c-b"));
        assert!(wildcard_match("*", "anything"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert!(config.parallel);
        assert_eq!(config.default_format, "table");
        assert_eq!(config.max_lockfile_bytes, DEFAULT_MAX_LOCKFILE_BYTES);
        assert_eq!(config.skip_dirs, vec!["node_modules", ".git"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "parallel = false\n[ignore]\npackages = [\"debug\"]\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.parallel);
        assert_eq!(config.bundle_dirs, Config::default().bundle_dirs);
        assert!(config.ignore.is_ignored("debug"));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "parallel = \"maybe\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = Config {
            watchlist: Some(PathBuf::from("/etc/lockwatch/list.txt")),
            extra_packages: vec!["@ctrl/tinycolor@4.1.1".to_string()],
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.watchlist, config.watchlist);
        assert_eq!(loaded.extra_packages, config.extra_packages);
    }

    #[test]
    fn test_apply_to_watchlist() {
        let config = Config {
            extra_packages: vec!["@ctrl/tinycolor@4.1.1".to_string(), "bogus".to_string()],
            ignore: IgnoreConfig {
                packages: vec!["color*".to_string()],
            },
            ..Config::default()
        };

        let mut watchlist = Watchlist::parse("color@5.0.1\ncolor-name@2.0.1\ndebug@4.4.2\n");
        config.apply_to(&mut watchlist);

        let entries: Vec<String> = watchlist.iter().map(|e| e.to_string()).collect();
        assert_eq!(entries, vec!["@ctrl/tinycolor@4.1.1", "debug@4.4.2"]);
    }
}
