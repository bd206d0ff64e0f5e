use anyhow::{Context, Result};
use bigexport::{feeds_from_config, init_tracing, open_input, run_feeds, Feed, FeedReport, ItemReader};
use bigexport_config::{
    apply_env_overrides, ExporterOptions, FeedsConfig, OptionMap, StdEnvSource,
};
use bigexport_core::Format;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Export scraped items to Parquet, Avro, ORC or Iceberg
#[derive(Parser)]
#[command(name = "bigexport")]
#[command(version)]
#[command(about = "Export scraped items to Parquet, Avro, ORC or Iceberg", long_about = None)]
struct Cli {
    /// Log level: trace, debug, info, warn, error (overrides config)
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export items with a single exporter
    Export(ExportArgs),
    /// Export items to every feed of a feed file
    Run(RunArgs),
    /// Show which formats this build can write
    Formats,
}

#[derive(Args)]
struct ExportArgs {
    /// Output format: parquet, avro, orc, iceberg
    #[arg(short, long)]
    format: Format,

    /// Output file (the summary file for iceberg)
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// JSON Lines input, `-` for stdin
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input: String,

    /// Exporter option, repeatable. Values are parsed as JSON when possible.
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, serde_json::Value)>,

    /// Warn about unknown options instead of failing
    #[arg(long)]
    tolerant: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Feed file (defaults to BIGEXPORT_CONFIG or ./bigexport.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON Lines input, `-` for stdin
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input: String,
}

fn parse_option(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("option key is empty in '{}'", raw));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Export(args) => {
            let mut config = FeedsConfig::default();
            apply_env_overrides(&mut config, &StdEnvSource)?;
            apply_log_level(&mut config, cli.log_level);
            init_tracing(&config.logging);
            export(args)
        }
        Command::Run(args) => {
            let mut config = match &args.config {
                Some(path) => bigexport_config::load_from_file_path(path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => FeedsConfig::load().context("Failed to load configuration")?,
            };
            apply_log_level(&mut config, cli.log_level);
            init_tracing(&config.logging);
            run(&config, &args.input)
        }
        Command::Formats => {
            for capability in bigexport::capabilities() {
                let status = if capability.available {
                    "available"
                } else {
                    "unavailable"
                };
                println!(
                    "{:<8} {:<12} {}",
                    capability.format, status, capability.dependency
                );
            }
            Ok(())
        }
    }
}

fn apply_log_level(config: &mut FeedsConfig, level: Option<String>) {
    if let Some(level) = level {
        config.logging.level = level;
    }
}

fn export(args: ExportArgs) -> Result<()> {
    let options: OptionMap = args.options.into_iter().collect();
    let options = ExporterOptions::parse(args.format, &options, args.tolerant)?;
    let mut feeds = vec![Feed::new(args.output, &options)?];
    let reader = ItemReader::new(open_input(&args.input)?);
    let reports = run_feeds(&mut feeds, reader)?;
    print_reports(&reports)
}

fn run(config: &FeedsConfig, input: &str) -> Result<()> {
    let mut feeds = feeds_from_config(config)?;
    info!(feeds = feeds.len(), "Loaded feed configuration");
    let reader = ItemReader::new(open_input(input)?);
    let reports = run_feeds(&mut feeds, reader)?;
    print_reports(&reports)
}

fn print_reports(reports: &[FeedReport]) -> Result<()> {
    for report in reports {
        println!("{}", serde_json::to_string(&report.to_json())?);
    }
    Ok(())
}
