//! Run and execution types.

use crate::cache::{CacheDecision, CacheKey};
use crate::ids::{InstanceId, RunId};
use crate::pipeline::{CacheSpec, CommandSpec, FailurePolicy};
use crate::trigger::TriggerEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered axis assignment of an instance.
pub type Assignment = Vec<(String, String)>;

/// One concrete run unit produced by expanding a job template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    pub id: InstanceId,
    pub template: String,
    /// Position in declaration order across the whole pipeline.
    pub index: usize,
    pub assignment: Assignment,
    pub commands: Vec<CommandSpec>,
    pub policy: FailurePolicy,
    pub cache: Option<CacheSpec>,
    pub timeout_minutes: Option<u32>,
    pub variables: HashMap<String, String>,
    /// Template names this instance waits on.
    pub depends_on: Vec<String>,
    /// Resolved predecessor instances, filled in by the graph builder.
    pub predecessors: Vec<InstanceId>,
}

impl JobInstance {
    pub fn is_tolerant(&self) -> bool {
        self.policy == FailurePolicy::Tolerant
    }

    pub fn axis(&self, name: &str) -> Option<&str> {
        self.assignment
            .iter()
            .find(|(axis, _)| axis == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
    Skipped,
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    CommandFailed { command: String, exit_code: i32 },
    TimedOut { command: String },
    ExecutorUnavailable { message: String },
}

/// Cache lookup recorded on a job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOutcome {
    pub key: CacheKey,
    pub hit: bool,
}

impl From<&CacheDecision> for CacheOutcome {
    fn from(decision: &CacheDecision) -> Self {
        Self {
            key: decision.key.clone(),
            hit: decision.hit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub instance: InstanceId,
    pub template: String,
    pub index: usize,
    pub assignment: Assignment,
    pub status: JobStatus,
    /// Set for failures of tolerant instances; excluded from the verdict.
    pub non_blocking: bool,
    pub output: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Upstream instance whose failure caused this job to be skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_because: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheOutcome>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    /// Result for an instance that never ran because `upstream` failed.
    pub fn skipped(instance: &JobInstance, upstream: InstanceId) -> Self {
        Self {
            instance: instance.id.clone(),
            template: instance.template.clone(),
            index: instance.index,
            assignment: instance.assignment.clone(),
            status: JobStatus::Skipped,
            non_blocking: instance.is_tolerant(),
            output: String::new(),
            duration_ms: 0,
            failure: None,
            skipped_because: Some(upstream),
            cache: None,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    /// Result for an instance whose execution aborted abnormally. Counts
    /// as a failure of the instance alone.
    pub fn crashed(instance: &JobInstance, message: impl Into<String>) -> Self {
        Self {
            instance: instance.id.clone(),
            template: instance.template.clone(),
            index: instance.index,
            assignment: instance.assignment.clone(),
            status: JobStatus::Failure,
            non_blocking: instance.is_tolerant(),
            output: String::new(),
            duration_ms: 0,
            failure: Some(FailureKind::ExecutorUnavailable {
                message: message.into(),
            }),
            skipped_because: None,
            cache: None,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    /// A failure that gates the run.
    pub fn is_blocking_failure(&self) -> bool {
        self.status == JobStatus::Failure && !self.non_blocking
    }

    /// Whether dependents of this job may run.
    pub fn satisfies_dependents(&self) -> bool {
        match self.status {
            JobStatus::Success => true,
            JobStatus::Failure => self.non_blocking,
            JobStatus::Skipped => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub tolerated: usize,
    pub skipped: usize,
}

/// Terminal artifact of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub pipeline: String,
    pub verdict: Verdict,
    pub event: TriggerEvent,
    pub summary: RunSummary,
    pub jobs: Vec<JobResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn job(&self, instance: &str) -> Option<&JobResult> {
        self.jobs.iter().find(|job| job.instance.as_str() == instance)
    }

    pub fn jobs_of<'a>(&'a self, template: &'a str) -> impl Iterator<Item = &'a JobResult> + 'a {
        self.jobs.iter().filter(move |job| job.template == template)
    }
}
