//! Clean reinstall of affected projects.
//!
//! For every affected directory the package manager is picked from the
//! lockfile present (pnpm, then yarn, then npm), `node_modules` is removed and
//! dependencies are installed again with lifecycle scripts disabled.
//!
//! Yarn 2+ ("berry") has no `--ignore-scripts` flag and reads its settings
//! from `YARN_*` variables, so it gets its own [`YarnBerry`] manager.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::discovery::LockfileDiscovery;
use crate::lockfile::Dialect;

/// A package manager able to reinstall a project's dependencies.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Executable name, without platform suffix.
    fn name(&self) -> &'static str;

    /// Arguments for an install that runs no lifecycle scripts.
    fn install_args(&self) -> &'static [&'static str];

    /// Environment variable that turns lifecycle scripts off.
    fn disable_scripts_env(&self) -> (&'static str, &'static str) {
        ("npm_config_ignore_scripts", "true")
    }

    fn program(&self) -> String {
        if cfg!(target_os = "windows") {
            format!("{}.cmd", self.name())
        } else {
            self.name().to_string()
        }
    }

    /// Command line as it would be typed.
    fn command_line(&self) -> String {
        format!("{} {}", self.name(), self.install_args().join(" "))
    }

    /// Whether the executable can be started at all.
    async fn is_available(&self) -> bool {
        Command::new(self.program())
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Removes `node_modules` in `dir` and installs again.
    ///
    /// Nothing is removed unless the package manager runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the package manager is not available,
    /// `node_modules` cannot be removed, or the install exits unsuccessfully.
    async fn reinstall(&self, dir: &Path) -> Result<()> {
        if !self.is_available().await {
            bail!(
                "Failed to execute {}. Is it installed? {} left untouched",
                self.name(),
                dir.display()
            );
        }

        let node_modules = dir.join("node_modules");
        if tokio::fs::try_exists(&node_modules).await.unwrap_or(false) {
            tracing::info!(path = %node_modules.display(), "removing node_modules");
            tokio::fs::remove_dir_all(&node_modules)
                .await
                .with_context(|| format!("Failed to remove {}", node_modules.display()))?;
        }

        let (env_key, env_value) = self.disable_scripts_env();
        tracing::info!(dir = %dir.display(), command = %self.command_line(), "reinstalling");
        let status = Command::new(self.program())
            .args(self.install_args())
            .current_dir(dir)
            .env(env_key, env_value)
            .status()
            .await
            .with_context(|| format!("Failed to execute {}. Is it installed?", self.name()))?;

        if !status.success() {
            bail!("{} exited with {} in {}", self.name(), status, dir.display());
        }
        Ok(())
    }
}

pub struct Npm;
pub struct Yarn;
pub struct YarnBerry;
pub struct Pnpm;

#[async_trait]
impl PackageManager for Npm {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn install_args(&self) -> &'static [&'static str] {
        &["install", "--ignore-scripts"]
    }
}

#[async_trait]
impl PackageManager for Yarn {
    fn name(&self) -> &'static str {
        "yarn"
    }

    fn install_args(&self) -> &'static [&'static str] {
        &["install", "--ignore-scripts"]
    }
}

#[async_trait]
impl PackageManager for YarnBerry {
    fn name(&self) -> &'static str {
        "yarn"
    }

    fn install_args(&self) -> &'static [&'static str] {
        &["install"]
    }

    fn disable_scripts_env(&self) -> (&'static str, &'static str) {
        ("YARN_ENABLE_SCRIPTS", "false")
    }

    fn command_line(&self) -> String {
        "YARN_ENABLE_SCRIPTS=false yarn install".to_string()
    }
}

#[async_trait]
impl PackageManager for Pnpm {
    fn name(&self) -> &'static str {
        "pnpm"
    }

    fn install_args(&self) -> &'static [&'static str] {
        &["install", "--ignore-scripts"]
    }
}

/// Picks the package manager for a project directory from its lockfiles.
pub fn detect_package_manager(dir: &Path) -> Option<Box<dyn PackageManager>> {
    let present = LockfileDiscovery::lockfiles_in(dir);
    if present.contains(&Dialect::Pnpm) {
        Some(Box::new(Pnpm))
    } else if present.contains(&Dialect::Yarn) {
        if is_yarn_berry(dir) {
            Some(Box::new(YarnBerry))
        } else {
            Some(Box::new(Yarn))
        }
    } else if present.contains(&Dialect::Npm) {
        Some(Box::new(Npm))
    } else {
        None
    }
}

/// Yarn 2+ projects carry `.yarnrc.yml` or a `__metadata:` block in `yarn.lock`.
fn is_yarn_berry(dir: &Path) -> bool {
    if dir.join(".yarnrc.yml").is_file() {
        return true;
    }
    std::fs::read_to_string(dir.join("yarn.lock"))
        .map(|content| content.lines().any(|line| line.starts_with("__metadata:")))
        .unwrap_or(false)
}

/// What happened, or would happen, in one affected directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    Planned { dir: PathBuf, command: String },
    Reinstalled { dir: PathBuf, command: String },
    Failed { dir: PathBuf, reason: String },
    NoPackageManager { dir: PathBuf },
}

/// Reinstalls every directory in turn. With `dry_run` nothing is touched.
pub async fn remediate<'a, I>(dirs: I, dry_run: bool) -> Vec<RemediationOutcome>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut outcomes = Vec::new();

    for dir in dirs {
        let Some(manager) = detect_package_manager(dir) else {
            tracing::warn!(dir = %dir.display(), "no lockfile left to pick a package manager");
            outcomes.push(RemediationOutcome::NoPackageManager { dir: dir.clone() });
            continue;
        };

        let command = manager.command_line();
        if dry_run {
            outcomes.push(RemediationOutcome::Planned {
                dir: dir.clone(),
                command,
            });
            continue;
        }

        match manager.reinstall(dir).await {
            Ok(()) => outcomes.push(RemediationOutcome::Reinstalled {
                dir: dir.clone(),
                command,
            }),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "reinstall failed");
                outcomes.push(RemediationOutcome::Failed {
                    dir: dir.clone(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    outcomes
}
