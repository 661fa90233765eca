//! tedbench CLI entry point

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tedbench::cli::{EstimateArgs, GraphArgs, RunArgs, ScriptArgs};
use tedbench::report::{parse_source_arg, Aggregate, PlotOptions};
use tedbench::session::SessionController;
use tedbench::{
    history, logparse, planner, report, script, target, Cli, Commands, Config, MatrixPlan,
    OutputFormat, TedbenchError,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; RUST_LOG overrides, --verbose raises the default
    let default_directive = if cli.verbose {
        "tedbench=debug"
    } else {
        "tedbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                default_directive
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::INFO.into()),
            ),
        )
        .with_writer(std::io::stderr)
        .try_init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> tedbench::Result<()> {
    match &cli.command {
        Commands::Run(args) => cmd_run(cli, args),
        Commands::Graph(args) => cmd_graph(cli, args),
        Commands::Estimate(args) => cmd_estimate(cli, args),
        Commands::Script(args) => cmd_script(args),
    }
}

/// Resolve the target machine: CLI override wins over the config parameter
fn resolve_machine(config: &Config, override_machine: &Option<String>) -> String {
    override_machine
        .clone()
        .unwrap_or_else(|| config.params.machine.clone())
}

fn load_config(path: &Path) -> tedbench::Result<Config> {
    let config = Config::load(path)?;
    tracing::debug!(
        versions = config.versions.len(),
        stem = %config.stem,
        "config loaded"
    );
    for version in &config.versions {
        tracing::debug!(
            label = %version.label,
            git_ref = %version.git_ref,
            "version record"
        );
    }
    Ok(config)
}

/// Synthesize the matrix script and launch it detached on the target
fn cmd_run(cli: &Cli, args: &RunArgs) -> tedbench::Result<()> {
    let config = load_config(&args.config)?;
    let machine = resolve_machine(&config, &args.machine);
    let plan = MatrixPlan::from_config(&config)?;

    tracing::info!(
        sizes = plan.sizes.len(),
        versions = plan.runs.len(),
        cells = plan.cell_count(),
        machine = %machine,
        "matrix planned"
    );

    if args.dry_run {
        // no connection is attempted; policy follows the named machine
        let text = script::synthesize(&config, &plan, machine == "local");
        print!("{}", text);
        return Ok(());
    }

    let target = target::connect(&machine)?;
    let text = script::synthesize(&config, &plan, target.is_local());

    history::append("running", &config.stem)?;
    let controller = SessionController::new(target.as_ref(), &config.stem);
    controller.launch(&text)?;

    let est = planner::estimate(&plan, &config.params);
    match cli.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "session": controller.name(),
                "machine": machine,
                "cells": est.cells,
                "est_seconds": est.est_seconds,
            })
        ),
        OutputFormat::Text => {
            println!(
                "Launched session '{}' on {} ({} cells, ~{:.0}s estimated)",
                controller.name(),
                machine,
                est.cells,
                est.est_seconds
            );
        }
    }
    Ok(())
}

/// Fetch captured logs, extract series, and render one chart per phrase
fn cmd_graph(cli: &Cli, args: &GraphArgs) -> tedbench::Result<()> {
    let sources: Vec<_> = args.sources.iter().map(|s| parse_source_arg(s)).collect();
    let disambiguate = sources.len() > 1;

    let mut aggregate = Aggregate::new();
    let mut first_stem: Option<String> = None;
    let mut single_title: Option<String> = None;

    for source in &sources {
        let config = load_config(&source.path)?;
        let machine = config.params.machine.clone();

        history::append("graphing", &config.stem)?;

        let target = target::connect(&machine)?;
        let controller = SessionController::new(target.as_ref(), &config.stem);
        let data_path = controller.fetch_results()?;
        tracing::info!(path = %data_path.display(), "metrics fetched");

        let versions = if source.runs.is_empty() {
            config.labels()
        } else {
            for run in &source.runs {
                if !config.versions.iter().any(|v| v.label == *run) {
                    return Err(TedbenchError::Config {
                        message: format!(
                            "requested run '{}' is not a version in {}",
                            run,
                            source.path.display()
                        ),
                    });
                }
            }
            source.runs.clone()
        };
        let phrases = config.metric_phrases();

        let text = fs::read_to_string(&data_path)?;
        let data = logparse::parse_log(&text, &versions, &phrases)?;
        aggregate.merge_file(&config.stem, &data, &versions, &phrases, disambiguate)?;

        if first_stem.is_none() {
            first_stem = Some(config.stem.clone());
            if !disambiguate {
                single_title = Some(config.params.benchmark_title.clone());
            }
        }
    }

    let out_dir = first_stem.unwrap_or_default();
    let options = PlotOptions {
        log_axes: args.log,
        suffix: args.suffix.clone(),
        custom_labels: args.labels.clone(),
        title_context: single_title,
    };

    for phrase in aggregate.phrases().to_vec() {
        let path = report::plot_phrase(Path::new(&out_dir), &phrase, &aggregate, &options)?;
        tracing::info!(chart = %path.display(), "chart written");
    }

    match cli.format {
        OutputFormat::Json => println!("{}", aggregate.to_json()),
        OutputFormat::Text => print!("{}", aggregate.format_table()),
    }
    Ok(())
}

/// Print the runtime/memory projection for the configured matrix
fn cmd_estimate(cli: &Cli, args: &EstimateArgs) -> tedbench::Result<()> {
    let config = load_config(&args.config)?;
    let plan = MatrixPlan::from_config(&config)?;
    let est = planner::estimate(&plan, &config.params);

    match cli.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&est).map_err(|e| TedbenchError::Config {
                    message: format!("estimate serialization failed: {}", e),
                })?
            );
        }
        OutputFormat::Text => {
            println!("Sizes:          {:?}", plan.sizes);
            println!("Matrix cells:   {}", est.cells);
            println!("Total tets:     {}", est.total_tets);
            println!("Est. runtime:   {:.0} s", est.est_seconds);
            println!("Est. peak mem:  {:.2} GB", est.est_peak_mem_kb / 1e6);
        }
    }
    Ok(())
}

/// Print the synthesized script for inspection
fn cmd_script(args: &ScriptArgs) -> tedbench::Result<()> {
    let config = load_config(&args.config)?;
    let machine = resolve_machine(&config, &args.machine);
    let plan = MatrixPlan::from_config(&config)?;
    print!("{}", script::synthesize(&config, &plan, machine == "local"));
    Ok(())
}
