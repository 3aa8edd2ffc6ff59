use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use covrun::cli;
use covrun::config::{Options, DEFAULT_CONFIG_FILE};
use covrun::report::{Print, ReportKind};
use covrun::threshold::ThresholdConfig;

/// covrun: merge persisted coverage documents into reports and check thresholds.
#[derive(Parser)]
#[command(name = "covrun", version, about)]
struct Cli {
    /// Options file (default: ./covrun.json, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every step at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding coverage documents and receiving reports.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Glob (relative to --dir) selecting documents to merge. Repeatable.
    #[arg(long, global = true)]
    collect: Vec<String>,

    /// Minimum percentage as METRIC=VALUE, e.g. lines=80. Repeatable.
    #[arg(long = "threshold", global = true, value_parser = parse_threshold)]
    thresholds: Vec<(String, f64)>,

    /// Key documents by their recorded paths instead of relativizing them.
    #[arg(long, global = true)]
    no_relativize: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge documents, write reports and enforce thresholds.
    Report {
        /// Report format (text, text-summary, lcov, lcovonly, html, clover,
        /// json, json-summary, teamcity, none). Repeatable.
        #[arg(long = "report")]
        reports: Vec<String>,

        /// Console output.
        #[arg(long, value_enum)]
        print: Option<Print>,
    },

    /// Merge documents and enforce thresholds only.
    Check,

    /// Print total coverage per metric.
    Summary,

    /// Print per-file coverage with uncovered line ranges.
    Files,

    /// Show uncovered lines for one source file.
    Uncovered {
        /// The source file path (as keyed in the merged documents).
        source_file: String,
    },
}

fn parse_threshold(s: &str) -> std::result::Result<(String, f64), String> {
    let (metric, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected METRIC=VALUE, got '{s}'"))?;
    let value: f64 = value
        .parse()
        .map_err(|e| format!("invalid percentage '{value}': {e}"))?;
    Ok((metric.to_string(), value))
}

fn load_options(cli: &Cli) -> Result<Options> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut options = if path.exists() {
        Options::from_path(&path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?
    } else if cli.config.is_some() {
        anyhow::bail!("Options file {} not found", path.display());
    } else {
        Options::default()
    };

    options.verbose |= cli.verbose;
    let coverage = &mut options.coverage;
    if let Some(dir) = &cli.dir {
        coverage.report_dir = dir.clone();
    }
    if !cli.collect.is_empty() {
        coverage.collect = cli.collect.clone();
    }
    if !cli.thresholds.is_empty() {
        coverage.thresholds = cli.thresholds.iter().cloned().collect::<ThresholdConfig>();
    }
    if cli.no_relativize {
        coverage.relativize = false;
    }
    if let Commands::Report { reports, print } = &cli.command {
        if !reports.is_empty() {
            coverage.report = reports
                .iter()
                .map(|r| r.parse::<ReportKind>())
                .collect::<covrun::error::Result<_>>()?;
        }
        if let Some(print) = print {
            coverage.print = *print;
        }
    }
    options.validate().context("Invalid options")?;
    Ok(options)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let options = load_options(&cli)?;
    let base_dir = std::env::current_dir().context("Failed to resolve working directory")?;

    let output = match &cli.command {
        Commands::Report { .. } => cli::cmd_report(&options, &base_dir)?,
        Commands::Check => cli::cmd_check(&options, &base_dir)?,
        Commands::Summary => cli::cmd_summary(&options, &base_dir)?,
        Commands::Files => cli::cmd_files(&options, &base_dir)?,
        Commands::Uncovered { source_file } => {
            cli::cmd_uncovered(&options, &base_dir, source_file)?
        }
    };
    print!("{output}");
    Ok(())
}
