//! `yarn.lock` extraction.
//!
//! A block starts with an unindented header listing one or more descriptors
//! that resolved to the same version, followed by indented fields:
//!
//! ```text
//! chalk@^5.0.0, chalk@^5.6.0:
//!   version "5.6.1"
//!   resolved "https://registry.yarnpkg.com/chalk/-/chalk-5.6.1.tgz"
//! ```
//!
//! Berry lockfiles quote the header and write `version: 5.6.1` instead.
//! Headers are free text, so the file is queried one package name at a time.

use std::collections::BTreeSet;

/// A `yarn.lock` file, borrowed for querying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YarnLock<'a> {
    content: &'a str,
}

impl<'a> YarnLock<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { content }
    }

    /// Versions resolved for `name`, or `None` when no header mentions it.
    ///
    /// A header that mentions `name` but whose block has no version field
    /// leaves the package present with an empty set.
    pub fn versions(&self, name: &str) -> Option<BTreeSet<String>> {
        let mut found: Option<BTreeSet<String>> = None;
        let mut in_matching_block = false;

        for line in self.content.lines() {
            if is_header(line) {
                in_matching_block = header_mentions(line, name);
                if in_matching_block {
                    found.get_or_insert_with(BTreeSet::new);
                }
                continue;
            }

            if !in_matching_block {
                continue;
            }

            if let Some(version) = version_field(line) {
                if let Some(versions) = found.as_mut() {
                    versions.insert(version.to_string());
                }
            }
        }

        found
    }
}

fn is_header(line: &str) -> bool {
    !line.starts_with(char::is_whitespace)
        && !line.starts_with('#')
        && line.trim_end().ends_with(':')
}

/// True when some descriptor in `header` is `name@...`.
///
/// `name@` must start a descriptor or follow the `npm:` of an alias
/// (`my-chalk@npm:chalk@^5.6.0`), so `color@` does not match inside
/// `supports-color@` or `@scope/color@`.
fn header_mentions(header: &str, name: &str) -> bool {
    let needle = format!("{name}@");
    header.match_indices(&needle).any(|(pos, _)| {
        header[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| matches!(c, '"' | '\'' | ',' | ' ' | '\t' | ':'))
    })
}

/// Value of an indented `version "X"` or `version: X` field.
fn version_field(line: &str) -> Option<&str> {
    if !line.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = line.trim().strip_prefix("version")?;
    let value = if let Some(value) = rest.strip_prefix(':') {
        value
    } else if rest.starts_with(char::is_whitespace) {
        rest
    } else {
        return None;
    };

    let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &str = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/core@^7.0.0", "@babel/core@^7.1.0":
  version "7.24.0"
  resolved "https://registry.yarnpkg.com/@babel/core/-/core-7.24.0.tgz"

chalk@^4.1.0:
  version "4.1.2"
  dependencies:
    supports-color "^7.1.0"

chalk@^5.0.0, chalk@^5.6.0:
  version "5.6.1"
  resolved "https://registry.yarnpkg.com/chalk/-/chalk-5.6.1.tgz"

supports-color@^7.1.0:
  version "7.2.0"
"#;

    const BERRY: &str = r#"__metadata:
  version: 8
  cacheKey: 10c0

"debug@npm:^4.3.4, debug@npm:^4.4.0":
  version: 4.4.2
  resolution: "debug@npm:4.4.2"
  languageName: node
  linkType: hard
"#;

    fn versions(content: &str, name: &str) -> Option<Vec<String>> {
        YarnLock::new(content)
            .versions(name)
            .map(|v| v.into_iter().collect())
    }

    #[test]
    fn test_aliased_header_block() {
        assert_eq!(
            versions(CLASSIC, "chalk"),
            Some(vec!["4.1.2".to_string(), "5.6.1".to_string()])
        );
    }

    #[test]
    fn test_scoped_package() {
        assert_eq!(
            versions(CLASSIC, "@babel/core"),
            Some(vec!["7.24.0".to_string()])
        );
    }

    #[test]
    fn test_absent_package() {
        assert_eq!(versions(CLASSIC, "debug"), None);
    }

    #[test]
    fn test_dependency_lines_are_not_headers() {
        // "supports-color" appears under chalk's dependencies, but only its
        // own block defines a version.
        assert_eq!(
            versions(CLASSIC, "supports-color"),
            Some(vec!["7.2.0".to_string()])
        );
    }

    #[test]
    fn test_name_suffix_does_not_match() {
        let lock = "supports-color@^7.1.0:\n  version \"7.2.0\"\n\n\"@scope/color@^1.0.0\":\n  version \"1.0.0\"\n";
        assert_eq!(versions(lock, "color"), None);
    }

    #[test]
    fn test_alias_descriptor_matches_real_package() {
        let classic = "\"my-chalk@npm:chalk@^5.6.0\":\n  version \"5.6.1\"\n";
        assert_eq!(versions(classic, "chalk"), Some(vec!["5.6.1".to_string()]));
        assert_eq!(versions(classic, "my-chalk"), Some(vec!["5.6.1".to_string()]));

        let berry = "\"my-chalk@npm:chalk@^5.6.0\":\n  version: 5.6.1\n  resolution: \"chalk@npm:5.6.1\"\n";
        assert_eq!(versions(berry, "chalk"), Some(vec!["5.6.1".to_string()]));
        assert_eq!(versions(berry, "halk"), None);
    }

    #[test]
    fn test_berry_format() {
        assert_eq!(versions(BERRY, "debug"), Some(vec!["4.4.2".to_string()]));
        // the metadata block's version is not a package version
        assert_eq!(versions(BERRY, "__metadata"), None);
    }

    #[test]
    fn test_header_without_version_is_present() {
        let lock = "left-pad@^1.0.0:\n  resolved \"file:../left-pad\"\n";
        assert_eq!(versions(lock, "left-pad"), Some(vec![]));
    }

    #[test]
    fn test_version_field_shapes() {
        assert_eq!(version_field("  version \"5.6.1\""), Some("5.6.1"));
        assert_eq!(version_field("  version: 4.4.2"), Some("4.4.2"));
        assert_eq!(version_field("  versions \"1\""), None);
        assert_eq!(version_field("version \"5.6.1\""), None);
        assert_eq!(version_field("  version \"\""), None);
    }
}
