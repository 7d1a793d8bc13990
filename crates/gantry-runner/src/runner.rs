//! Runner configuration and output types.

use std::time::Duration;

/// Output line captured from a command.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub content: String,
    pub line_number: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Output stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Configuration for command execution.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Shell used as `<shell> -c <command>`.
    pub shell: String,
    /// Applied when a request carries no timeout of its own.
    pub default_timeout: Option<Duration>,
    /// Pass the host environment through to commands.
    pub inherit_env: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            default_timeout: Some(Duration::from_secs(3600)), // 1 hour default
            inherit_env: true,
        }
    }
}
