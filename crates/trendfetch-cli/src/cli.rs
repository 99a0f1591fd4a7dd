use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Fetch trend series with bounded retry, validate them, and persist one
/// JSON record per topic.
#[derive(Parser, Debug)]
#[command(name = "trendfetch", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch topics and persist their records
    Fetch(FetchArgs),

    /// Validate a payload array or a persisted record offline
    Validate {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Print the embedded payload JSON Schema
    Schema,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Topics to fetch (default: `topics` from the config file)
    pub topics: Vec<String>,

    /// YAML configuration file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Directory for record files (overrides `output.dir`)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Maximum attempts per topic (overrides `fetch.attempt_budget`)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: Option<u32>,

    /// Maximum topics fetched at once (overrides `fetch.concurrency`)
    #[arg(long, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Per-topic deadline, e.g. "30s" or "2m" (overrides `fetch.deadline`)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// Serve payloads from a fixture file instead of the configured transport
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Fetch and validate, but keep records in memory
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("concurrency must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
