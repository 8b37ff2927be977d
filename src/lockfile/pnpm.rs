//! `pnpm-lock.yaml` extraction.
//!
//! Package identities live in mapping keys:
//!
//! ```yaml
//! lockfileVersion: '6.0'
//! packages:
//!   /chalk@5.6.1:
//!     resolution: {integrity: sha512-...}
//!   /react-dom@18.2.0(react@18.2.0):
//!     resolution: {integrity: sha512-...}
//! ```
//!
//! Lockfile v9 drops the leading slash and quotes scoped keys
//! (`'@babel/core@7.24.0':`). Lockfile v5 writes `/chalk/5.6.1:`.

use regex::Regex;
use std::sync::LazyLock;

use super::{Dialect, LockfileIndex};
use crate::error::ExtractError;

/// `/<name>@<version>:` with optional slash and quotes.
static PACKAGE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*['"]?/?((?:@[^/\s'"@]+/)?[^/\s'"@:]+)@([^:'"\s]+)['"]?:"#)
        .expect("package key pattern is valid")
});

/// Lockfile v5 `/<name>/<version>:` keys.
static LEGACY_PACKAGE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*['"]?/((?:@[^/\s'"@]+/)?[^/\s'"@:]+)/(\d[^:/'"\s]*)['"]?:"#)
        .expect("legacy package key pattern is valid")
});

pub(super) fn extract(content: &str) -> Result<LockfileIndex, ExtractError> {
    if !content.trim().is_empty() && !has_lockfile_version(content) {
        return Err(ExtractError::Parse {
            dialect: Dialect::Pnpm,
            reason: "missing top-level lockfileVersion".to_string(),
        });
    }

    let mut index = LockfileIndex::new();

    for line in content.lines() {
        let caps = PACKAGE_KEY
            .captures(line)
            .or_else(|| LEGACY_PACKAGE_KEY.captures(line));
        let Some(caps) = caps else {
            continue;
        };

        let version = strip_peer_suffix(&caps[2]);
        if !version.is_empty() {
            index.insert(&caps[1], version);
        }
    }

    Ok(index)
}

fn has_lockfile_version(content: &str) -> bool {
    content.lines().any(|line| {
        line.trim_start_matches(['\'', '"'])
            .starts_with("lockfileVersion")
    })
}

/// `18.2.0(react@18.2.0)` and `1.0.0_react@18.2.0` both lock `18.2.0`/`1.0.0`.
fn strip_peer_suffix(version: &str) -> &str {
    match version.find(['(', '_']) {
        Some(pos) => &version[..pos],
        None => version,
    }
}
