//! Job execution: runs one instance's command list over the command port.

use chrono::Utc;
use gantry_core::cache::CacheDecision;
use gantry_core::pipeline::CommandKind;
use gantry_core::ports::{CommandExecutor, CommandRequest};
use gantry_core::run::{CacheOutcome, FailureKind, JobInstance, JobResult, JobStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub workspace: PathBuf,
    /// Pipeline-level variables exported to every command.
    pub variables: HashMap<String, String>,
    /// Applied to jobs that declare no timeout.
    pub default_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            variables: HashMap::new(),
            default_timeout: Some(Duration::from_secs(60 * 60)),
        }
    }
}

pub struct JobExecutor {
    commands: Arc<dyn CommandExecutor>,
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(commands: Arc<dyn CommandExecutor>, config: ExecutorConfig) -> Self {
        Self { commands, config }
    }

    /// Run an instance's commands in order, stopping at the first failure.
    ///
    /// On a cache hit `build` commands are skipped; `verify` commands always
    /// run. A failure never escapes as an error: it is recorded on the
    /// returned result.
    pub async fn run(&self, instance: &JobInstance, cache: Option<&CacheDecision>) -> JobResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let cache_hit = cache.is_some_and(|c| c.hit);

        let env = self.environment(instance, cache);
        let timeout = instance
            .timeout_minutes
            .map(|m| Duration::from_secs(u64::from(m) * 60))
            .or(self.config.default_timeout);

        let mut output = String::new();
        let mut failure = None;

        for (step, command) in instance.commands.iter().enumerate() {
            if cache_hit && command.kind == CommandKind::Build {
                debug!(job = %instance.id, command = %command.label(), "Skipping build command on cache hit");
                output.push_str(&format!("$ {} (skipped: cache hit)\n", command.run));
                continue;
            }

            output.push_str(&format!("$ {}\n", command.run));
            let request = CommandRequest {
                command: command.run.clone(),
                workdir: self.config.workspace.clone(),
                env: env.clone(),
                timeout,
            };

            match self.commands.execute(&request).await {
                Ok(result) => {
                    output.push_str(&result.output);
                    if result.timed_out {
                        warn!(job = %instance.id, step, command = %command.label(), "Command timed out");
                        failure = Some(FailureKind::TimedOut {
                            command: command.run.clone(),
                        });
                        break;
                    }
                    if result.exit_code != 0 {
                        info!(job = %instance.id, step, exit_code = result.exit_code, command = %command.label(), "Command failed");
                        failure = Some(FailureKind::CommandFailed {
                            command: command.run.clone(),
                            exit_code: result.exit_code,
                        });
                        break;
                    }
                }
                Err(e) => {
                    warn!(job = %instance.id, error = %e, "Command executor unavailable");
                    output.push_str(&format!("{}\n", e));
                    failure = Some(FailureKind::ExecutorUnavailable {
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }

        let status = if failure.is_some() {
            JobStatus::Failure
        } else {
            JobStatus::Success
        };

        JobResult {
            instance: instance.id.clone(),
            template: instance.template.clone(),
            index: instance.index,
            assignment: instance.assignment.clone(),
            status,
            non_blocking: instance.is_tolerant(),
            output,
            duration_ms: start.elapsed().as_millis() as u64,
            failure,
            skipped_because: None,
            cache: cache.map(CacheOutcome::from),
            started_at: Some(started_at),
            finished_at: Utc::now(),
        }
    }

    fn environment(
        &self,
        instance: &JobInstance,
        cache: Option<&CacheDecision>,
    ) -> HashMap<String, String> {
        let mut env = self.config.variables.clone();
        env.extend(instance.variables.clone());

        for (axis, value) in &instance.assignment {
            env.insert(format!("MATRIX_{}", env_name(axis)), value.clone());
        }
        env.insert("GANTRY_JOB".to_string(), instance.id.to_string());
        if let Some(cache) = cache {
            env.insert("GANTRY_CACHE_KEY".to_string(), cache.key.to_string());
            env.insert("GANTRY_CACHE_HIT".to_string(), cache.hit.to_string());
        }
        env
    }
}

fn env_name(axis: &str) -> String {
    axis.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
