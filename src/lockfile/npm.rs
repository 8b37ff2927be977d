//! `package-lock.json` / `npm-shrinkwrap.json` extraction.
//!
//! Two layouts exist and a v2 lockfile carries both:
//!
//! ```json
//! {
//!   "lockfileVersion": 2,
//!   "packages": {
//!     "node_modules/@babel/core": { "version": "7.24.0" },
//!     "node_modules/a/node_modules/debug": { "version": "2.6.9" }
//!   },
//!   "dependencies": {
//!     "debug": { "version": "4.4.2", "dependencies": { "ms": { "version": "2.1.3" } } }
//!   }
//! }
//! ```
//!
//! Both are walked and the results unioned.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Dialect, LockfileIndex};
use crate::error::ExtractError;

const INSTALL_DIR: &str = "node_modules/";

#[derive(Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: BTreeMap<String, FlatEntry>,
    #[serde(default)]
    dependencies: BTreeMap<String, NestedEntry>,
}

/// Entry of the `packages` map, keyed by install path.
#[derive(Deserialize)]
struct FlatEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Node of the legacy `dependencies` tree, keyed by package name.
#[derive(Deserialize)]
struct NestedEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, NestedEntry>,
}

/// Top-level keys of which a lockfile carries at least one.
const LOCKFILE_KEYS: &[&str] = &["lockfileVersion", "packages", "dependencies"];

fn parse_error(reason: impl Into<String>) -> ExtractError {
    ExtractError::Parse {
        dialect: Dialect::Npm,
        reason: reason.into(),
    }
}

pub(super) fn extract(content: &str) -> Result<LockfileIndex, ExtractError> {
    let document: Value = serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;

    // serde also builds `PackageLock` from a JSON array
    let Some(object) = document.as_object() else {
        return Err(parse_error("top-level value is not an object"));
    };
    if !LOCKFILE_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(parse_error(
            "no lockfileVersion, packages or dependencies field",
        ));
    }

    let lock: PackageLock =
        serde_json::from_value(document).map_err(|e| parse_error(e.to_string()))?;

    let mut index = LockfileIndex::new();

    for (key, entry) in &lock.packages {
        let name = match non_empty(&entry.name) {
            Some(name) => Some(name.to_string()),
            None => package_name_from_path(key),
        };
        let Some(name) = name else {
            continue;
        };

        match non_empty(&entry.version) {
            Some(version) => index.insert(&name, version),
            None => index.mark_present(&name),
        }
    }

    for (key, entry) in &lock.dependencies {
        walk_nested(key, entry, &mut index);
    }

    Ok(index)
}

/// Records `entry` and every node below it.
///
/// Nodes without a usable version still have their children visited.
fn walk_nested(key: &str, entry: &NestedEntry, index: &mut LockfileIndex) {
    let name = non_empty(&entry.name).unwrap_or(key);

    if !name.is_empty() {
        match non_empty(&entry.version) {
            Some(version) => {
                index.insert(name, version);
                // "npm:<real>@<version>" aliases also lock the real package.
                if let Some((real, real_version)) = parse_alias(version) {
                    index.insert(real, real_version);
                }
            }
            None => index.mark_present(name),
        }
    }

    for (child_key, child) in &entry.dependencies {
        walk_nested(child_key, child, index);
    }
}

/// Package name from an install path such as
/// `node_modules/a/node_modules/@scope/pkg`.
///
/// Only the segment after the last `node_modules/` counts. A segment that
/// starts with `@` is joined with the following one.
fn package_name_from_path(key: &str) -> Option<String> {
    let pos = key.rfind(INSTALL_DIR)?;
    let mut segments = key[pos + INSTALL_DIR.len()..].split('/');

    let first = segments.next().filter(|s| !s.is_empty())?;
    if first.starts_with('@') {
        let second = segments.next().filter(|s| !s.is_empty())?;
        Some(format!("{first}/{second}"))
    } else {
        Some(first.to_string())
    }
}

fn parse_alias(version: &str) -> Option<(&str, &str)> {
    let target = version.strip_prefix("npm:")?;
    let (name, version) = target.rsplit_once('@')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_layout() {
        let lock = r#"{
            "name": "app",
            "lockfileVersion": 3,
            "packages": {
                "": { "name": "app", "version": "1.0.0" },
                "node_modules/debug": { "version": "4.4.2" },
                "node_modules/express/node_modules/debug": { "version": "2.6.9" },
                "node_modules/@babel/core": { "version": "7.24.0" },
                "node_modules/string-width-cjs": { "name": "string-width", "version": "4.2.3" }
            }
        }"#;
        let index = extract(lock).unwrap();

        let debug: Vec<_> = index.versions("debug").unwrap().iter().cloned().collect();
        assert_eq!(debug, vec!["2.6.9", "4.4.2"]);
        assert!(index.versions("@babel/core").unwrap().contains("7.24.0"));
        assert!(index.versions("string-width").unwrap().contains("4.2.3"));
        assert!(index.versions("string-width-cjs").is_none());
        assert!(index.versions("express").is_none());
    }

    #[test]
    fn test_flat_entry_without_version_is_present() {
        let lock = r#"{
            "packages": {
                "node_modules/local-lib": { "resolved": "libs/local-lib", "link": true }
            }
        }"#;
        let index = extract(lock).unwrap();
        assert!(index.versions("local-lib").unwrap().is_empty());
    }

    #[test]
    fn test_flat_key_without_install_dir_is_skipped() {
        let lock = r#"{ "packages": { "libs/local-lib": { "version": "0.1.0" } } }"#;
        let index = extract(lock).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_nested_layout() {
        let lock = r#"{
            "lockfileVersion": 1,
            "dependencies": {
                "foo": {
                    "version": "1.0.0",
                    "requires": { "debug": "^4.0.0" },
                    "dependencies": {
                        "debug": {
                            "version": "4.4.2",
                            "dependencies": { "ms": { "version": "2.1.3" } }
                        }
                    }
                },
                "debug": { "version": "4.3.4" }
            }
        }"#;
        let index = extract(lock).unwrap();

        assert!(index.versions("foo").unwrap().contains("1.0.0"));
        assert_eq!(index.versions("debug").unwrap().len(), 2);
        assert!(index.versions("ms").unwrap().contains("2.1.3"));
    }

    #[test]
    fn test_nested_placeholder_children_are_visited() {
        let lock = r#"{
            "dependencies": {
                "wrapper": {
                    "dependencies": { "chalk": { "version": "5.6.1" } }
                }
            }
        }"#;
        let index = extract(lock).unwrap();

        assert!(index.versions("wrapper").unwrap().is_empty());
        assert!(index.versions("chalk").unwrap().contains("5.6.1"));
    }

    #[test]
    fn test_nested_alias_records_real_package() {
        let lock = r#"{ "dependencies": { "my-chalk": { "version": "npm:chalk@5.6.1" } } }"#;
        let index = extract(lock).unwrap();
        assert!(index.versions("chalk").unwrap().contains("5.6.1"));
    }

    #[test]
    fn test_invalid_document_is_parse_error() {
        for content in [
            "not json!",
            "[1, 2, 3]",
            "[]",
            "[{}, {}]",
            "{}",
            r#"{ "name": "app" }"#,
            r#"{ "packages": [] }"#,
            "",
        ] {
            let err = extract(content).unwrap_err();
            assert!(matches!(
                err,
                ExtractError::Parse {
                    dialect: Dialect::Npm,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_empty_lockfile_is_clean_not_error() {
        let index = extract(r#"{ "name": "app", "lockfileVersion": 3, "packages": {} }"#).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_package_name_from_path() {
        assert_eq!(
            package_name_from_path("node_modules/lodash"),
            Some("lodash".to_string())
        );
        assert_eq!(
            package_name_from_path("node_modules/@types/node"),
            Some("@types/node".to_string())
        );
        assert_eq!(
            package_name_from_path("node_modules/a/node_modules/@scope/b"),
            Some("@scope/b".to_string())
        );
        assert_eq!(package_name_from_path("node_modules/@scope"), None);
        assert_eq!(package_name_from_path(""), None);
    }
}
