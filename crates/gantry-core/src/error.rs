//! Error types for Gantry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Definition errors
    #[error("Invalid pipeline definition: {0}")]
    InvalidPipeline(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    // Infrastructure errors
    #[error("Command executor unavailable: {0}")]
    ExecutorUnavailable(String),

    #[error("Cache store error: {0}")]
    CacheStore(String),

    #[error("Report sink error: {0}")]
    ReportSink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while resolving job dependencies into an execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Cycle detected in job dependencies: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    #[error("Job '{job}' depends on unknown job '{predecessor}'")]
    UnknownPredecessor { job: String, predecessor: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is raised before any job runs.
    pub fn is_definition_error(&self) -> bool {
        matches!(self, Error::InvalidPipeline(_) | Error::Graph(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
