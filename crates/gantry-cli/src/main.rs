//! Gantry CLI entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;
mod sinks;

use commands::{Commands, ConfigCommands};
use config::GantryConfig;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(author, version, about = "Gantry pipeline runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GantryConfig::load()?;

    match cli.command {
        Commands::Run {
            path,
            event,
            branch,
            source,
            commit,
            jobs,
            report,
            no_cache,
            verbose,
        } => {
            let options = handlers::RunOptions {
                event,
                branch,
                source,
                commit,
                jobs,
                report,
                no_cache,
                verbose,
            };
            if !handlers::run_pipeline(&config, &path, options).await? {
                std::process::exit(1);
            }
        }
        Commands::Validate { path } => handlers::validate(&path)?,
        Commands::Plan { path } => handlers::plan(&path)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
        },
    }

    Ok(())
}
