//! Cache resolution for job instances.
//!
//! Caching is an optimization only: every store failure degrades to a miss
//! and never changes a job's verdict.

use chrono::Utc;
use gantry_cache::CacheKeyBuilder;
use gantry_core::cache::{ArtifactSet, CacheDecision, CacheKey};
use gantry_core::ports::CacheStore;
use gantry_core::run::JobInstance;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CacheResolver {
    store: Option<Arc<dyn CacheStore>>,
    workspace: PathBuf,
}

impl CacheResolver {
    pub fn new(store: Arc<dyn CacheStore>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            store: Some(store),
            workspace: workspace.into(),
        }
    }

    /// A resolver without a store: keys are still computed, every lookup
    /// misses.
    pub fn disabled(workspace: impl Into<PathBuf>) -> Self {
        Self {
            store: None,
            workspace: workspace.into(),
        }
    }

    /// Compute the key for an instance's declared inputs. `None` when the
    /// job declares no cache.
    pub fn key_for(&self, instance: &JobInstance) -> Option<CacheKey> {
        let spec = instance.cache.as_ref()?;

        let mut builder = CacheKeyBuilder::new(&spec.key);
        for file in &spec.files {
            builder = builder.file(&self.workspace, file);
        }
        for input in &spec.inputs {
            builder = builder.input(input);
        }
        for (axis, value) in &instance.assignment {
            builder = builder.pair(axis, value);
        }

        Some(builder.build())
    }

    /// Look up an instance's key in the store.
    pub async fn resolve(&self, instance: &JobInstance) -> Option<CacheDecision> {
        let key = self.key_for(instance)?;

        let Some(store) = &self.store else {
            return Some(CacheDecision::miss(key));
        };

        match store.get(&key).await {
            Ok(Some(_)) => {
                info!(job = %instance.id, key = %key, "Cache hit");
                Some(CacheDecision::hit(key))
            }
            Ok(None) => {
                debug!(job = %instance.id, key = %key, "Cache miss");
                Some(CacheDecision::miss(key))
            }
            Err(e) => {
                warn!(job = %instance.id, key = %key, error = %e, "Cache lookup failed, treating as miss");
                Some(CacheDecision::miss(key))
            }
        }
    }

    /// Store an entry for a job that produced fresh artifacts. Failures are
    /// logged and otherwise ignored.
    pub async fn record(&self, instance: &JobInstance, key: &CacheKey) {
        let Some(store) = &self.store else {
            return;
        };

        let artifacts = ArtifactSet {
            key: key.clone(),
            produced_by: instance.id.clone(),
            paths: instance
                .cache
                .as_ref()
                .map(|spec| spec.paths.clone())
                .unwrap_or_default(),
            created_at: Utc::now(),
        };

        match store.put(key, artifacts).await {
            Ok(()) => debug!(job = %instance.id, key = %key, "Cache entry written"),
            Err(e) => warn!(job = %instance.id, key = %key, error = %e, "Cache write failed"),
        }
    }
}
