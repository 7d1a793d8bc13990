//! Shell-based command execution on the host.

use crate::runner::{OutputLine, OutputStream, RunnerConfig};
use async_trait::async_trait;
use gantry_core::ports::{CommandExecutor, CommandOutput, CommandRequest};
use gantry_core::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Exit code reported for commands killed on timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// How long output is still read after the process has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Shell runner for executing commands on the host.
pub struct ShellRunner {
    config: RunnerConfig,
    live_output: Option<mpsc::Sender<OutputLine>>,
}

impl ShellRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            live_output: None,
        }
    }

    /// Also forward every captured line to `tx` as it arrives.
    pub fn with_live_output(mut self, tx: mpsc::Sender<OutputLine>) -> Self {
        self.live_output = Some(tx);
        self
    }

    fn stream_lines<R>(
        reader: R,
        stream: OutputStream,
        tx: mpsc::Sender<OutputLine>,
    ) -> tokio::task::JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            let mut line_num = 0u32;

            while let Ok(Some(line)) = lines.next_line().await {
                line_num += 1;
                let output = OutputLine {
                    stream,
                    content: line,
                    line_number: line_num,
                    timestamp: chrono::Utc::now(),
                };
                if tx.send(output).await.is_err() {
                    break;
                }
            }
        })
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

#[async_trait]
impl CommandExecutor for ShellRunner {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let start = std::time::Instant::now();

        info!(command = %request.command, workdir = %request.workdir.display(), "Executing shell command");

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c")
            .arg(&request.command)
            .current_dir(&request.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !self.config.inherit_env {
            cmd.env_clear();
        }
        cmd.envs(&request.env);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::ExecutorUnavailable(format!("Failed to spawn process: {}", e)))?;

        let (tx, mut rx) = mpsc::channel::<OutputLine>(256);
        let mut handles = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            handles.push(Self::stream_lines(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            handles.push(Self::stream_lines(stderr, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        let live = self.live_output.clone();
        let collector = tokio::spawn(async move {
            let mut output = String::new();
            while let Some(line) = rx.recv().await {
                output.push_str(&line.content);
                output.push('\n');
                if let Some(live) = &live {
                    let _ = live.send(line).await;
                }
            }
            output
        });

        let limit = request.timeout.or(self.config.default_timeout);
        let (status, timed_out) = match limit {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => (status, false),
                Err(_) => {
                    warn!(command = %request.command, timeout_secs = limit.as_secs(), "Command timed out, killing process");
                    let _ = child.kill().await;
                    (child.wait().await, true)
                }
            },
            None => (child.wait().await, false),
        };

        // Background grandchildren can hold the pipes open after the shell
        // exits; stop reading once the grace period is over.
        for mut handle in handles {
            if timed_out || timeout(OUTPUT_DRAIN_GRACE, &mut handle).await.is_err() {
                handle.abort();
                let _ = handle.await;
            }
        }
        let output = collector
            .await
            .map_err(|e| Error::Internal(format!("Output collector failed: {}", e)))?;

        let status = status
            .map_err(|e| Error::ExecutorUnavailable(format!("Failed to wait for process: {}", e)))?;

        let exit_code = if timed_out {
            TIMEOUT_EXIT_CODE
        } else {
            status.code().unwrap_or(-1)
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(exit_code, duration_ms, timed_out, "Command completed");

        Ok(CommandOutput {
            exit_code,
            output,
            duration_ms,
            timed_out,
        })
    }
}
