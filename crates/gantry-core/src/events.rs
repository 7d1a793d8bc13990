//! Progress events emitted while a run executes.

use crate::ids::{InstanceId, RunId};
use crate::run::{JobStatus, Verdict};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        pipeline: String,
        jobs: usize,
    },
    JobStarted {
        run_id: RunId,
        instance: InstanceId,
        cache_hit: Option<bool>,
    },
    JobFinished {
        run_id: RunId,
        instance: InstanceId,
        status: JobStatus,
        non_blocking: bool,
        duration_ms: u64,
    },
    JobSkipped {
        run_id: RunId,
        instance: InstanceId,
        upstream: InstanceId,
    },
    RunCompleted {
        run_id: RunId,
        verdict: Verdict,
        duration_ms: u64,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::JobStarted { run_id, .. }
            | RunEvent::JobFinished { run_id, .. }
            | RunEvent::JobSkipped { run_id, .. }
            | RunEvent::RunCompleted { run_id, .. } => *run_id,
        }
    }
}
