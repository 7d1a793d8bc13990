//! Command handlers.

use crate::config::GantryConfig;
use crate::sinks::{ConsoleSink, JsonFileSink};
use console::style;
use gantry_cache::FilesystemStore;
use gantry_core::events::RunEvent;
use gantry_core::pipeline::PipelineDefinition;
use gantry_core::run::JobStatus;
use gantry_core::trigger::{TriggerEvent, TriggerKind};
use gantry_runner::{OutputLine, OutputStream, RunnerConfig, ShellRunner};
use gantry_scheduler::{
    ExecutionGraph, GraphBuilder, Orchestrator, OrchestratorConfig, TriggerMatcher,
    validate as validate_definition,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Flags of the `run` command.
pub struct RunOptions {
    pub event: String,
    pub branch: String,
    pub source: Option<String>,
    pub commit: Option<String>,
    pub jobs: Option<usize>,
    pub report: Option<PathBuf>,
    pub no_cache: bool,
    pub verbose: bool,
}

fn load_pipeline(path: &str) -> Result<PipelineDefinition, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;
    Ok(serde_yaml::from_str(&content)?)
}

fn build_graph(definition: &PipelineDefinition) -> gantry_core::Result<ExecutionGraph> {
    validate_definition(definition)?;
    GraphBuilder::new().build(definition)
}

/// Validate a pipeline configuration.
pub fn validate(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let definition = load_pipeline(path)?;
    let graph = match build_graph(&definition) {
        Ok(graph) => graph,
        Err(e) if e.is_definition_error() => {
            println!(
                "{} Pipeline \"{}\" is invalid: {}",
                style("✗").red(),
                definition.name,
                e
            );
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{} Pipeline \"{}\" is valid",
        style("✓").green(),
        definition.name
    );
    println!("  Jobs: {} ({} instances)", definition.jobs.len(), graph.len());

    for job in &definition.jobs {
        println!(
            "    - {} ({} commands, {} instances)",
            job.name,
            job.commands.len(),
            graph.instances_of(&job.name).len()
        );
    }

    Ok(())
}

/// Print the expanded instances and their predecessors.
pub fn plan(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let definition = load_pipeline(path)?;
    let graph = build_graph(&definition)?;

    println!(
        "{} Plan for {}: {} instances\n",
        style("▶").cyan(),
        style(&definition.name).bold(),
        graph.len()
    );

    for instance in graph.instances() {
        let tolerant = if instance.is_tolerant() {
            style(" (tolerant)").yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {}{}",
            style(format!("[{}]", instance.index)).dim(),
            style(&instance.id).bold(),
            tolerant
        );
        if !instance.predecessors.is_empty() {
            let preds: Vec<String> = instance
                .predecessors
                .iter()
                .map(|p| match graph.index_of(p) {
                    Some(idx) => format!("[{}] {}", idx, p),
                    None => p.to_string(),
                })
                .collect();
            println!("      after: {}", preds.join(", "));
        }
    }

    Ok(())
}

/// Run a pipeline on this host. Returns whether the run passed.
pub async fn run_pipeline(
    config: &GantryConfig,
    path: &str,
    options: RunOptions,
) -> Result<bool, Box<dyn std::error::Error>> {
    let definition = load_pipeline(path)?;
    let matcher = TriggerMatcher::new();
    let event = trigger_event(&options)
        .filter(|_| matcher.evaluate_raw(&definition.triggers, &options.event, &options.branch));
    let Some(event) = event else {
        println!(
            "{} No trigger of {} matches event {} on {}, nothing to run",
            style("i").blue(),
            definition.name,
            options.event,
            options.branch
        );
        return Ok(true);
    };

    let workspace = Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or(std::env::current_dir()?);
    let default_timeout = Some(Duration::from_secs(config.default_timeout_minutes * 60));

    let mut runner = ShellRunner::new(RunnerConfig {
        shell: config.shell.clone(),
        default_timeout,
        inherit_env: true,
    });
    let live = if options.verbose {
        let (tx, rx) = mpsc::channel(256);
        runner = runner.with_live_output(tx);
        Some(tokio::spawn(print_output(rx)))
    } else {
        None
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(print_progress(events_rx));

    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig {
            max_concurrency: options.jobs.unwrap_or(config.max_concurrency),
            workspace,
            default_timeout,
        },
        Arc::new(runner),
    )
    .with_events(events_tx)
    .with_sink(Arc::new(ConsoleSink));

    if !options.no_cache {
        orchestrator = orchestrator.with_cache_store(Arc::new(FilesystemStore::new(config.cache_dir()?)));
    }
    if let Some(report) = &options.report {
        orchestrator = orchestrator.with_sink(Arc::new(JsonFileSink::new(report)));
    }

    println!(
        "\n{} Running pipeline: {} ({} on {})\n",
        style("▶").cyan().bold(),
        style(&definition.name).bold(),
        event.kind,
        style(&event.branch).dim()
    );

    let outcome = orchestrator.run(&definition, event).await;

    // Close the event and output channels so the printers finish.
    drop(orchestrator);
    let _ = progress.await;
    if let Some(live) = live {
        let _ = live.await;
    }

    match outcome? {
        Some(report) => {
            if let Some(path) = &options.report {
                println!("  Report written to {}", path.display());
            }
            Ok(report.verdict.is_pass())
        }
        None => {
            println!(
                "{} No trigger of {} matches this event, nothing to run",
                style("i").blue(),
                definition.name
            );
            Ok(true)
        }
    }
}

/// Event described by the flags; `None` for kinds that cannot start a run.
fn trigger_event(options: &RunOptions) -> Option<TriggerEvent> {
    let kind: TriggerKind = options.event.parse().ok()?;
    let mut event = match kind {
        TriggerKind::Push => TriggerEvent::push(&options.branch),
        TriggerKind::PullRequest => {
            let mut event = TriggerEvent::pull_request(String::new(), &options.branch);
            event.source_branch = options.source.clone();
            event
        }
    };
    if let Some(commit) = &options.commit {
        event = event.with_commit(commit);
    }
    Some(event)
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<RunEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::JobStarted {
                instance, cache_hit, ..
            } => {
                let cache = match cache_hit {
                    Some(true) => style(" (cache hit)").cyan().to_string(),
                    _ => String::new(),
                };
                println!("  {} {}{}", style("→").cyan(), instance, cache);
            }
            RunEvent::JobFinished {
                instance,
                status,
                non_blocking,
                duration_ms,
                ..
            } => {
                let marker = match status {
                    JobStatus::Success => style("✓").green(),
                    _ if non_blocking => style("!").yellow(),
                    _ => style("✗").red(),
                };
                println!(
                    "  {} {} {}",
                    marker,
                    instance,
                    style(format!("{:.2}s", duration_ms as f64 / 1000.0)).dim()
                );
            }
            RunEvent::JobSkipped {
                instance, upstream, ..
            } => {
                println!(
                    "  {} {} {}",
                    style("-").dim(),
                    instance,
                    style(format!("skipped, {} failed", upstream)).dim()
                );
            }
            RunEvent::RunStarted { .. } | RunEvent::RunCompleted { .. } => {}
        }
    }
}

async fn print_output(mut rx: mpsc::Receiver<OutputLine>) {
    while let Some(line) = rx.recv().await {
        match line.stream {
            OutputStream::Stdout => println!("    {} {}", style("│").dim(), line.content),
            OutputStream::Stderr => eprintln!("    {} {}", style("│").red(), line.content),
        }
    }
}

/// Show configuration.
pub fn show_config(config: &GantryConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current configuration:");
    println!("  max_concurrency: {}", config.max_concurrency);
    println!("  cache_dir: {}", config.cache_dir()?.display());
    println!("  default_timeout_minutes: {}", config.default_timeout_minutes);
    println!("  shell: {}", config.shell);

    match GantryConfig::config_path()? {
        Some(path) => println!("\nConfig file: {}", path.display()),
        None => println!("\nConfig file: (none, using defaults)"),
    }

    Ok(())
}
