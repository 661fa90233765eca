//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Build-and-benchmark sweep orchestrator for tetrahedral mesh simulations
#[derive(Parser, Debug)]
#[command(name = "tedbench")]
#[command(about = "Runs (version x problem size) benchmark sweeps and graphs the captured metrics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format for summaries (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format for command summaries
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Available subcommands for tedbench
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize the benchmark script and launch it in a detached session
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Fetch captured logs, extract metric series, and render charts
    #[command(visible_alias = "g")]
    Graph(GraphArgs),

    /// Project total runtime and peak memory for the configured matrix
    Estimate(EstimateArgs),

    /// Print the synthesized benchmark script without launching anything
    Script(ScriptArgs),
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Relative path to the two-section benchmark config table
    #[arg(value_name = "CONFIG_CSV")]
    pub config: PathBuf,

    /// Target machine, overriding the config's `machine` parameter
    #[arg(value_name = "MACHINE")]
    pub machine: Option<String>,

    /// Synthesize and print the script, but do not connect or launch
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the graph command
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Config paths, each optionally followed by ':<run label>' selectors
    #[arg(value_name = "CONFIG_CSV[:RUN...]", required = true)]
    pub sources: Vec<String>,

    /// Use logarithmic x and y axes
    #[arg(short, long)]
    pub log: bool,

    /// Suffix inserted into chart file names
    #[arg(short, long, default_value = "")]
    pub suffix: String,

    /// Display label overriding a run key (repeatable, in run order)
    #[arg(long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,
}

/// Arguments for the estimate command
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Relative path to the two-section benchmark config table
    #[arg(value_name = "CONFIG_CSV")]
    pub config: PathBuf,
}

/// Arguments for the script command
#[derive(Args, Debug)]
pub struct ScriptArgs {
    /// Relative path to the two-section benchmark config table
    #[arg(value_name = "CONFIG_CSV")]
    pub config: PathBuf,

    /// Target machine, overriding the config's `machine` parameter
    #[arg(value_name = "MACHINE")]
    pub machine: Option<String>,
}
