//! Copy-pasteable dependency override blocks.
//!
//! Each watchlisted package gets a range that allows every version except the
//! compromised ones. The same ranges are rendered for npm's `overrides` and
//! yarn's `resolutions` fields of `package.json`.

use anyhow::Result;
use semver::Version;
use std::collections::BTreeMap;

use crate::model::Watchlist;

/// Range excluding exactly the given versions.
///
/// Versions are chained in semver order when they all parse, in string order
/// otherwise.
///
/// ```
/// use lockwatch::overrides::excluding_range;
///
/// assert_eq!(excluding_range(&["5.6.1"]), "<5.6.1 || >5.6.1");
/// assert_eq!(
///     excluding_range(&["5.0.1", "5.0.0"]),
///     "<5.0.0 || >5.0.0 <5.0.1 || >5.0.1"
/// );
/// ```
pub fn excluding_range(versions: &[&str]) -> String {
    let parsed: Option<Vec<Version>> = versions.iter().map(|v| Version::parse(v).ok()).collect();
    let ordered: Vec<String> = match parsed {
        Some(mut semvers) => {
            semvers.sort();
            semvers.dedup();
            semvers.iter().map(Version::to_string).collect()
        }
        None => {
            let mut plain: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
            plain.sort();
            plain.dedup();
            plain
        }
    };

    ordered
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if i == 0 {
                format!("<{v} || >{v}")
            } else {
                format!(" <{v} || >{v}")
            }
        })
        .collect()
}

fn ranges(watchlist: &Watchlist) -> BTreeMap<&str, String> {
    watchlist
        .by_package()
        .into_iter()
        .map(|(name, versions)| (name, excluding_range(&versions)))
        .collect()
}

fn render_field(field: &str, watchlist: &Watchlist) -> Result<String> {
    let body = serde_json::to_string_pretty(&ranges(watchlist))?;
    Ok(format!("\"{field}\": {body}"))
}

/// npm `overrides` block.
pub fn npm_overrides(watchlist: &Watchlist) -> Result<String> {
    render_field("overrides", watchlist)
}

/// yarn `resolutions` block.
pub fn yarn_resolutions(watchlist: &Watchlist) -> Result<String> {
    render_field("resolutions", watchlist)
}

/// Both blocks with short headings, as printed by `lockwatch overrides`.
pub fn render_all(watchlist: &Watchlist) -> Result<String> {
    Ok(format!(
        "// npm (package.json)\n{}\n\n// yarn (package.json)\n{}\n",
        npm_overrides(watchlist)?,
        yarn_resolutions(watchlist)?
    ))
}
