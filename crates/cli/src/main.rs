//! htdeploy: one-way deployment of a local tree to a target directory
//!
//! Publishes a website or application: after each run the target matches
//! the local tree, uploading only what changed, committing every upload
//! atomically via rename, and recording the deployed state in a compressed
//! manifest at the target root.

mod config;
mod filters;
mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::builder::styling::{AnsiColor, Effects};
use clap::{builder::Styles, Parser, Subcommand};
use color_eyre::Result;
use tracing::debug;

use htdeploy_core::{Deployer, Job, NullLogger, PatternSet, Preprocessor, Scanner};
use htdeploy_server::LocalServer;

use crate::config::DeployConfig;
use crate::progress::ConsoleLogger;

const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Magenta.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Magenta.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Blue.on_default())
    .placeholder(AnsiColor::Cyan.on_default().effects(Effects::ITALIC));

#[derive(Parser)]
#[command(name = "htdeploy")]
#[command(version)]
#[command(styles = HELP_STYLES)]
#[command(about = "One-way deployment with atomic rename-to-commit")]
#[command(long_about = r#"
htdeploy publishes a local directory tree to a deploy target.

How it works:
  • Fingerprints  - MD5 over preprocessed content, no timestamps
  • Minimal plan  - uploads only what changed, optional deletes
  • Atomic commit - staged .deploytmp uploads, renamed in one pass
  • Manifest      - deployed state recorded at the target root

Examples:
  htdeploy deploy                   Deploy using ./htdeploy.toml
  htdeploy deploy site.toml --test  Show the plan, change nothing
  htdeploy scan ./web               Print the local fingerprint map
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy according to a configuration file
    Deploy {
        /// Path to the deployment configuration
        #[arg(default_value = "htdeploy.toml")]
        config: PathBuf,

        /// Plan and log operations without touching the target
        #[arg(short, long)]
        test: bool,
    },

    /// Scan a directory and print its fingerprint map
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show version and build info
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    color_eyre::install()?;
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            eprintln!("htdeploy {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Scan { path } => {
            scan_command(&path)?;
        }
        Commands::Deploy { config, test } => {
            deploy_command(&config, test)?;
        }
    }

    Ok(())
}

/// Diagnostics go through `tracing`; deploy-visible output goes through the
/// console logger, so the default level stays quiet.
fn init_tracing(verbose: bool) {
    let directives = if verbose { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_env_filter(directives)
        .without_time()
        .compact()
        .init();
}

fn scan_command(path: &Path) -> Result<()> {
    let preprocessor = Preprocessor::new(
        std::env::temp_dir().join("htdeploy"),
        PatternSet::empty(),
    );
    let map = Scanner::new(path).scan(&preprocessor, &NullLogger)?;

    for (entry, fingerprint) in map.iter() {
        println!("{:>32}  {entry}", fingerprint.to_string());
    }
    progress::note(&format!("{} entries", map.len()));
    Ok(())
}

fn deploy_command(config_path: &Path, test: bool) -> Result<()> {
    let config = DeployConfig::load(config_path)?;
    debug!("loaded configuration from {}", config_path.display());

    // paths in the config file are relative to the file itself
    let base = config_path.parent().unwrap_or(Path::new("."));
    let local = base.join(&config.local);

    let pre_jobs = parse_jobs(&config.before)?;
    let post_jobs = parse_jobs(&config.after)?;

    let mut builder = Deployer::builder(
        local,
        Box::new(LocalServer::new(&config.target)),
        Box::new(ConsoleLogger::new()),
    )
    .ignore_masks(config.ignore)
    .preprocess_masks(config.preprocess.clone())
    .allow_delete(config.allow_delete)
    .purge(config.purge)
    .pre_jobs(pre_jobs)
    .post_jobs(post_jobs)
    .manifest_name(config.manifest)
    .test_mode(test);

    if let Some(temp_dir) = config.temp_dir {
        builder = builder.temp_dir(base.join(temp_dir));
    }
    if !config.preprocess.is_empty() {
        builder = builder.filter("css", Arc::new(filters::CssMinify), true);
    }

    let report = builder.build()?.deploy()?;
    progress::summary(&report);
    Ok(())
}

fn parse_jobs(specs: &[String]) -> Result<Vec<Job>> {
    specs
        .iter()
        .map(|spec| Ok(Job::parse(spec)?))
        .collect()
}
