//! Trigger events delivered by the event source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of event that can start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Push,
    PullRequest,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Push => "push",
            TriggerKind::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(TriggerKind::Push),
            "pull_request" | "pull-request" => Ok(TriggerKind::PullRequest),
            other => Err(format!("unknown trigger kind: {}", other)),
        }
    }
}

/// An inbound event, kept verbatim in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    /// Pushed branch, or the target branch of a pull request.
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn push(branch: impl Into<String>) -> Self {
        Self {
            kind: TriggerKind::Push,
            branch: branch.into(),
            source_branch: None,
            commit: None,
            actor: None,
            received_at: Utc::now(),
        }
    }

    pub fn pull_request(source_branch: impl Into<String>, target_branch: impl Into<String>) -> Self {
        Self {
            kind: TriggerKind::PullRequest,
            branch: target_branch.into(),
            source_branch: Some(source_branch.into()),
            commit: None,
            actor: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}
