//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline locally for a trigger event
    Run {
        /// Path to pipeline file
        #[arg(default_value = "gantry.yaml")]
        path: String,

        /// Trigger kind (push or pull_request)
        #[arg(short, long, default_value = "push")]
        event: String,

        /// Pushed branch, or the target branch of a pull request
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Source branch of a pull request
        #[arg(long)]
        source: Option<String>,

        /// Commit being built
        #[arg(long)]
        commit: Option<String>,

        /// Maximum jobs running at once
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Write the JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Disable the artifact cache
        #[arg(long)]
        no_cache: bool,

        /// Stream command output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate pipeline configuration
    Validate {
        /// Path to pipeline file
        #[arg(default_value = "gantry.yaml")]
        path: String,
    },

    /// Show the expanded job plan without running anything
    Plan {
        /// Path to pipeline file
        #[arg(default_value = "gantry.yaml")]
        path: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
}
