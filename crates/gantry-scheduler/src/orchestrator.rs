//! Run orchestration: trigger check, planning, scheduling and reporting.

use crate::aggregate::{RunContext, aggregate};
use crate::cache::CacheResolver;
use crate::dag::{ExecutionGraph, GraphBuilder};
use crate::executor::{ExecutorConfig, JobExecutor};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::triggers::TriggerMatcher;
use crate::validation::validate;
use chrono::Utc;
use futures::future::join_all;
use gantry_core::Result;
use gantry_core::events::RunEvent;
use gantry_core::ids::RunId;
use gantry_core::pipeline::PipelineDefinition;
use gantry_core::ports::{CacheStore, CommandExecutor, ReportSink};
use gantry_core::run::RunReport;
use gantry_core::trigger::TriggerEvent;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrency: usize,
    /// Working directory for commands and cache file inputs.
    pub workspace: PathBuf,
    pub default_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            max_concurrency: SchedulerConfig::default().max_concurrency,
            workspace: executor.workspace,
            default_timeout: executor.default_timeout,
        }
    }
}

/// Entry point for running pipelines against trigger events.
pub struct Orchestrator {
    config: OrchestratorConfig,
    commands: Arc<dyn CommandExecutor>,
    cache_store: Option<Arc<dyn CacheStore>>,
    sinks: Vec<Arc<dyn ReportSink>>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    triggers: TriggerMatcher,
    graphs: GraphBuilder,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, commands: Arc<dyn CommandExecutor>) -> Self {
        Self {
            config,
            commands,
            cache_store: None,
            sinks: Vec::new(),
            events: None,
            triggers: TriggerMatcher::new(),
            graphs: GraphBuilder::new(),
        }
    }

    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Validate a definition and build its execution graph without running
    /// anything.
    pub fn plan(&self, definition: &PipelineDefinition) -> Result<ExecutionGraph> {
        validate(definition)?;
        self.graphs.build(definition)
    }

    /// Run a pipeline for an event.
    ///
    /// Returns `Ok(None)` when no trigger accepts the event. Definition and
    /// graph errors are returned before any job starts. Job failures are
    /// part of the report, never an `Err`.
    pub async fn run(
        &self,
        definition: &PipelineDefinition,
        event: TriggerEvent,
    ) -> Result<Option<RunReport>> {
        if !self.triggers.matches(&definition.triggers, &event) {
            info!(
                pipeline = %definition.name,
                kind = %event.kind,
                branch = %event.branch,
                "Event does not match any trigger, ignoring"
            );
            return Ok(None);
        }

        let graph = Arc::new(self.plan(definition)?);
        let context = RunContext {
            run_id: RunId::new(),
            pipeline: definition.name.clone(),
            event,
            started_at: Utc::now(),
        };
        info!(
            run_id = %context.run_id,
            pipeline = %context.pipeline,
            jobs = graph.len(),
            "Starting run"
        );
        self.emit(RunEvent::RunStarted {
            run_id: context.run_id,
            pipeline: context.pipeline.clone(),
            jobs: graph.len(),
        });

        let executor = Arc::new(JobExecutor::new(
            self.commands.clone(),
            ExecutorConfig {
                workspace: self.config.workspace.clone(),
                variables: definition.variables.clone(),
                default_timeout: self.config.default_timeout,
            },
        ));
        let cache = Arc::new(match &self.cache_store {
            Some(store) => CacheResolver::new(store.clone(), &self.config.workspace),
            None => CacheResolver::disabled(&self.config.workspace),
        });

        let mut scheduler = Scheduler::new(
            SchedulerConfig {
                max_concurrency: self.config.max_concurrency,
            },
            executor,
            cache,
        );
        if let Some(tx) = &self.events {
            scheduler = scheduler.with_events(tx.clone());
        }

        let results = scheduler.run(context.run_id, graph).await;
        let report = aggregate(context, results);

        info!(
            run_id = %report.run_id,
            verdict = ?report.verdict,
            duration_ms = report.duration_ms,
            "Run completed"
        );
        self.emit(RunEvent::RunCompleted {
            run_id: report.run_id,
            verdict: report.verdict,
            duration_ms: report.duration_ms,
        });

        let published = join_all(self.sinks.iter().map(|sink| sink.publish(&report))).await;
        for result in published {
            if let Err(e) = result {
                warn!(run_id = %report.run_id, error = %e, "Failed to publish report");
            }
        }

        Ok(Some(report))
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
