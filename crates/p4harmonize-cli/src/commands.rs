use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "p4harmonize")]
#[command(about = "Stage the differences between a git commit and a Perforce stream", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List both sides, reconcile, and open a pending changelist with the differences
    Run {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Log destination changes instead of making them
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Delete the destination client and workspace directory
    Clean {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Log what would be deleted
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Print the effective configuration as TOML
    PrintConfig {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}
