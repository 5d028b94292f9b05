mod commands;
mod logging;
mod progress;

use std::path::Path;
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use p4harmonize_core::config::load_configuration;
use p4harmonize_core::{AppConfig, Harmonizer, RunSummary};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    let _guard = logging::init_logger();

    let result = match command {
        Commands::Run { config, dry_run } => run(&config, dry_run),
        Commands::Clean { config, dry_run } => clean(&config, dry_run),
        Commands::PrintConfig { config } => print_config(&config),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("Error: {:#}", err);
            process::exit(1);
        }
    }
}

fn load(path: &Path) -> anyhow::Result<AppConfig> {
    load_configuration(path)
        .with_context(|| format!("Error loading configuration from {}", path.display()))
}

fn run(config_path: &Path, dry_run: bool) -> anyhow::Result<bool> {
    let config = load(config_path)?;
    info!(
        "Harmonizing {} into {}{}",
        config.source.root,
        config.stream(),
        if dry_run { " (dry run)" } else { "" }
    );

    let harmonizer = Harmonizer::new(config).with_dry_run(dry_run);
    let reporter = CliReporter::new();
    let summary = harmonizer.run(&reporter).context("Run failed")?;

    print_summary(&summary);
    Ok(summary.is_success())
}

fn clean(config_path: &Path, dry_run: bool) -> anyhow::Result<bool> {
    let config = load(config_path)?;
    Harmonizer::new(config)
        .with_dry_run(dry_run)
        .clean()
        .context("Clean failed")?;
    info!("{}", "Clean complete".green());
    Ok(true)
}

fn print_config(config_path: &Path) -> anyhow::Result<bool> {
    let config = load(config_path)?;
    let text = toml::to_string_pretty(&config).context("Error serializing configuration")?;
    println!("{}", text);
    Ok(true)
}

fn print_summary(summary: &RunSummary) {
    let stats = &summary.stats;

    println!();
    info!(
        "Compare: {}, Total: {}",
        format!("{:.2}s", summary.list_duration.as_secs_f64()).green(),
        format!("{:.2}s", summary.total_duration.as_secs_f64()).green(),
    );
    info!(
        "{} source only, {} destination only, {} case mismatched, {} changed, {} unchanged",
        format!("{}", stats.source_only).cyan(),
        format!("{}", stats.destination_only).cyan(),
        format!("{}", stats.case_mismatched).cyan(),
        format!("{}", stats.real_edits).cyan(),
        format!("{}", stats.unchanged).cyan(),
    );

    for issue in &summary.issues {
        warn!("{}", issue.to_string().yellow());
    }

    let Some(report) = &summary.report else {
        info!("{}", "Destination already matches source".green());
        return;
    };

    info!(
        "{} actions staged, {} reverted as unchanged, {} left open",
        format!("{}", report.staged.len()).cyan(),
        format!("{}", report.reverted.len()).cyan(),
        format!("{}", report.surviving_count()).green(),
    );

    if !report.errors.is_empty() {
        error!(
            "{} errors, {} actions skipped:",
            format!("{}", report.errors.len()).red(),
            format!("{}", report.skipped.len()).red()
        );
        for err in &report.errors {
            error!("  {}", err.to_string().red());
        }
    }

    if let Some(failure) = &report.failure {
        error!("Stopped early: {}", failure.red());
    }

    if !report.deferred.is_empty() {
        warn!(
            "{} adds deferred to the next run:",
            format!("{}", report.deferred.len()).yellow()
        );
        for path in &report.deferred {
            warn!("  {}", path);
        }
    }

    if summary.second_pass_required {
        warn!(
            "{}",
            "Case-only renames need a second pass: submit this changelist, then run again"
                .yellow()
        );
    }

    match summary.changelist {
        Some(change) => info!(
            "Pending changelist {} is ready for review",
            format!("{}", change).green()
        ),
        None if summary.dry_run => info!("{}", "Dry run: no changes were made".yellow()),
        None => {}
    }
}
