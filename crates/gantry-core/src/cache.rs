//! Cache types.

use crate::ids::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic digest of a job's declared cache inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the cache store keeps for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub key: CacheKey,
    pub produced_by: InstanceId,
    #[serde(default)]
    pub paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a lookup made before a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDecision {
    pub hit: bool,
    pub key: CacheKey,
}

impl CacheDecision {
    pub fn hit(key: CacheKey) -> Self {
        Self { hit: true, key }
    }

    pub fn miss(key: CacheKey) -> Self {
        Self { hit: false, key }
    }
}
