//! Heuristic scan of built JavaScript bundles.
//!
//! A lockfile only shows what is installed. A bundle built while a compromised
//! version was installed keeps the payload after the lockfile is fixed. This
//! scan looks for markers of the September 2025 wallet-drainer payload in
//! `.js`, `.mjs` and `.cjs` files under the usual build output directories.

use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::model::BundleHit;

/// Identifiers and attacker wallet addresses from the drainer payload.
static PAYLOAD_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"checkethereumw|runmask|newdlocal|_0x19ca67|0xFc4a4858bafef54D1b1d7697bfb5c52F4c166976|1H13VnQJKtT4HjD5ZFKaaiZEetMbG7nDHx|TB9emsCq6fQw6wRk4HBxxNnU6Hwt1DnV67",
    )
    .expect("payload marker pattern is valid")
});

const BUNDLE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

pub struct BundleScanner {
    bundle_dirs: Vec<String>,
    max_file_bytes: u64,
}

impl BundleScanner {
    pub fn new(bundle_dirs: Vec<String>, max_file_bytes: u64) -> Self {
        Self {
            bundle_dirs,
            max_file_bytes,
        }
    }

    /// Scans the bundle directories directly under each root.
    pub fn scan(&self, roots: &[PathBuf]) -> Vec<BundleHit> {
        let mut hits = Vec::new();

        for root in roots.iter().filter(|r| r.is_dir()) {
            for dir_name in &self.bundle_dirs {
                let dir = root.join(dir_name);
                if dir.is_dir() {
                    tracing::debug!(dir = %dir.display(), "scanning bundle directory");
                    hits.extend(self.scan_dir(&dir));
                }
            }
        }

        hits
    }

    fn scan_dir(&self, dir: &Path) -> Vec<BundleHit> {
        let mut hits = Vec::new();

        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != "node_modules");

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() || !is_bundle_file(entry.path()) {
                continue;
            }

            let too_large = entry
                .metadata()
                .map(|m| m.len() > self.max_file_bytes)
                .unwrap_or(true);
            if too_large {
                tracing::debug!(path = %entry.path().display(), "skipping large or unreadable bundle");
                continue;
            }

            match fs::read_to_string(entry.path()) {
                Ok(content) => hits.extend(scan_content(entry.path(), &content)),
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "cannot read bundle");
                }
            }
        }

        hits
    }
}

fn is_bundle_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| BUNDLE_EXTENSIONS.contains(&ext))
}

/// One hit per distinct marker in a file, at its first line.
pub fn scan_content(file: &Path, content: &str) -> Vec<BundleHit> {
    let mut seen = BTreeSet::new();
    let mut hits = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        for m in PAYLOAD_MARKERS.find_iter(line) {
            if seen.insert(m.as_str()) {
                hits.push(BundleHit {
                    file: file.to_path_buf(),
                    marker: m.as_str().to_string(),
                    line: idx + 1,
                });
            }
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_content_finds_markers_once() {
        let content = "var a=1;\nfunction checkethereumw(){}; checkethereumw();\nrunmask(x)\n";
        let hits = scan_content(Path::new("main.js"), content);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].marker, "checkethereumw");
        assert_eq!(hits[0].line, 2);
        assert_eq!(hits[1].marker, "runmask");
        assert_eq!(hits[1].line, 3);
    }

    #[test]
    fn test_clean_content() {
        let hits = scan_content(Path::new("main.js"), "console.log('hello ethereum');\n");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_scan_only_bundle_dirs_and_extensions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("dist/assets")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("dist/assets/index.js"), "const _0x19ca67=1;").unwrap();
        fs::write(root.join("dist/assets/index.css"), "runmask").unwrap();
        fs::write(root.join("src/index.js"), "runmask").unwrap();

        let scanner = BundleScanner::new(vec!["dist".to_string()], 1024 * 1024);
        let hits = scanner.scan(&[root.to_path_buf()]);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].marker, "_0x19ca67");
        assert!(hits[0].file.ends_with("dist/assets/index.js"));
    }

    #[test]
    fn test_oversized_bundle_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/app.cjs"), "runmask runmask runmask").unwrap();

        let scanner = BundleScanner::new(vec!["build".to_string()], 4);
        assert!(scanner.scan(&[dir.path().to_path_buf()]).is_empty());
    }
}
