//! Pipeline planning and orchestration for Gantry.
//!
//! Turns a [`PipelineDefinition`](gantry_core::pipeline::PipelineDefinition)
//! and a trigger event into executed, monitored and reported job runs.

pub mod aggregate;
pub mod cache;
pub mod dag;
pub mod executor;
pub mod matrix;
pub mod orchestrator;
pub mod scheduler;
pub mod triggers;
pub mod validation;

pub use aggregate::{RunContext, aggregate};
pub use cache::CacheResolver;
pub use dag::{ExecutionGraph, GraphBuilder};
pub use executor::{ExecutorConfig, JobExecutor};
pub use matrix::MatrixExpander;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use scheduler::{NodeState, Scheduler, SchedulerConfig};
pub use triggers::TriggerMatcher;
pub use validation::validate;
