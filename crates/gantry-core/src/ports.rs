//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the orchestration core and
//! its external collaborators: command execution, cache storage and report
//! publication.

use crate::Result;
use crate::cache::{ArtifactSet, CacheKey};
use crate::run::RunReport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// A single command to execute.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub workdir: PathBuf,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

/// What the command layer reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
    pub duration_ms: u64,
    /// The command was killed after exceeding its timeout.
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Executes commands. An `Err` means the collaborator itself is
/// unavailable; a failing command is an `Ok` with a non-zero exit code.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// Best-effort artifact store keyed by cache key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up an entry.
    async fn get(&self, key: &CacheKey) -> Result<Option<ArtifactSet>>;

    /// Store an entry, replacing any previous one.
    async fn put(&self, key: &CacheKey, artifacts: ArtifactSet) -> Result<()>;
}

/// Receives finished reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, report: &RunReport) -> Result<()>;
}
