use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use lockwatch::{
    bundle::BundleScanner,
    config::Config,
    discovery::LockfileDiscovery,
    output::{format_report_to_string, print_report, OutputFormat},
    overrides,
    remediate::{remediate, RemediationOutcome},
    scan::LockfileScanner,
    Watchlist,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit codes outside the scan severities (0 clean, 8 warning, 10 exact)
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const USAGE: u8 = 2;
}

#[derive(Parser)]
#[command(name = "lockwatch")]
#[command(
    author,
    version,
    about = "Detect known-compromised npm package versions in project lockfiles"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan lockfiles under the given paths
    Scan {
        /// Directories or lockfiles to scan
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Watchlist file with one name@version per line
        #[arg(short, long)]
        watchlist: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Write output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Check lockfiles one at a time
        #[arg(long)]
        no_parallel: bool,

        /// Reinstall affected projects with lifecycle scripts disabled
        #[arg(long)]
        fix: bool,

        /// With --fix, print the reinstall plan without running it
        #[arg(long, requires = "fix")]
        dry_run: bool,

        /// Also search built bundles for known payload markers
        #[arg(long)]
        bundles: bool,
    },

    /// Print dependency override blocks that exclude compromised versions
    Overrides {
        /// Watchlist file with one name@version per line
        #[arg(short, long)]
        watchlist: Option<PathBuf>,
    },

    /// Print the effective watchlist
    Watchlist {
        /// Watchlist file with one name@version per line
        #[arg(short, long)]
        watchlist: Option<PathBuf>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Raised for bad invocations, before any scanning happens.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) if e.is::<UsageError>() => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::USAGE)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %Config::config_path().display(), "ignoring unreadable config");
        Config::default()
    });

    match cli.command {
        Commands::Scan {
            paths,
            watchlist,
            format,
            output,
            no_parallel,
            fix,
            dry_run,
            bundles,
        } => {
            let format_str = format.unwrap_or_else(|| config.default_format.clone());
            let options = ScanOptions {
                paths,
                format: OutputFormat::from_str(&format_str).map_err(UsageError)?,
                output,
                parallel: !no_parallel && config.parallel,
                fix,
                dry_run,
                bundles,
            };
            let watchlist = load_watchlist(watchlist.as_deref(), &config)?;

            run_scan(options, watchlist, &config).await
        }
        Commands::Overrides { watchlist } => {
            let watchlist = load_watchlist(watchlist.as_deref(), &config)?;
            print!("{}", overrides::render_all(&watchlist)?);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Watchlist { watchlist } => {
            let watchlist = load_watchlist(watchlist.as_deref(), &config)?;
            println!("Watchlist ({} entries):", watchlist.len());
            for entry in &watchlist {
                println!("  {}", entry);
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

struct ScanOptions {
    paths: Vec<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
    parallel: bool,
    fix: bool,
    dry_run: bool,
    bundles: bool,
}

/// The `--watchlist` flag wins over the config file, which wins over the
/// built-in list.
fn load_watchlist(flag: Option<&Path>, config: &Config) -> Result<Watchlist> {
    let path = flag.or(config.watchlist.as_deref());
    let mut watchlist = Watchlist::load(path).map_err(|e| UsageError(e.to_string()))?;
    config.apply_to(&mut watchlist);

    tracing::info!(entries = watchlist.len(), "watchlist loaded");
    Ok(watchlist)
}

async fn run_scan(options: ScanOptions, watchlist: Watchlist, config: &Config) -> Result<u8> {
    if let Some(missing) = options.paths.iter().find(|p| !p.exists()) {
        return Err(UsageError(format!("path does not exist: {}", missing.display())).into());
    }

    let is_interactive = options.format == OutputFormat::Table && options.output.is_none();
    if watchlist.is_empty() {
        eprintln!("[i] Watchlist is empty, nothing to look for");
    }

    let lockfiles = LockfileDiscovery::new(config.skip_dirs.clone()).discover(&options.paths);
    tracing::info!(count = lockfiles.len(), "lockfiles discovered");

    let progress = if is_interactive {
        let pb = ProgressBar::new(lockfiles.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} Scanning lockfiles...")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let scanner = LockfileScanner::new(watchlist).with_max_lockfile_bytes(config.max_lockfile_bytes);
    let mut report = scanner.scan(&lockfiles, options.parallel, &progress).await;
    progress.finish_and_clear();

    if options.bundles {
        let bundle_scanner =
            BundleScanner::new(config.bundle_dirs.clone(), config.max_lockfile_bytes);
        report.record_bundle_hits(bundle_scanner.scan(&options.paths));
    }

    // Handle output
    if let Some(path) = &options.output {
        let content = format_report_to_string(&report, options.format)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("[i] Results written to: {}", path.display());
    } else {
        print_report(&report, options.format)?;
    }

    if options.fix && !report.affected_dirs.is_empty() {
        print_remediation(&remediate(&report.affected_dirs, options.dry_run).await);
    }

    Ok(report.severity().exit_code())
}

fn print_remediation(outcomes: &[RemediationOutcome]) {
    eprintln!();
    eprintln!("Remediation:");
    for outcome in outcomes {
        match outcome {
            RemediationOutcome::Planned { dir, command } => {
                eprintln!("  [i] would run `{}` in {}", command, dir.display());
            }
            RemediationOutcome::Reinstalled { dir, command } => {
                eprintln!("  [i] ran `{}` in {}", command, dir.display());
            }
            RemediationOutcome::Failed { dir, reason } => {
                eprintln!("  [x] {}: {}", dir.display(), reason);
            }
            RemediationOutcome::NoPackageManager { dir } => {
                eprintln!("  [!] {}: no lockfile to pick a package manager", dir.display());
            }
        }
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'lockwatch config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
