//! Bounded-concurrency execution of an execution graph.

use crate::cache::CacheResolver;
use crate::dag::ExecutionGraph;
use crate::executor::JobExecutor;
use futures::FutureExt;
use gantry_core::events::RunEvent;
use gantry_core::ids::RunId;
use gantry_core::run::{JobInstance, JobResult};
use std::any::Any;
use std::collections::{BTreeSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on simultaneously running instances.
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Lifecycle of an instance within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting on predecessors.
    Pending,
    /// All predecessors satisfied, waiting for a free slot.
    Ready,
    Running,
    /// Finished, failed or skipped.
    Done,
}

/// Mutable bookkeeping for one run, guarded by a single lock.
struct Progress {
    states: Vec<NodeState>,
    /// Unsatisfied predecessor count per instance.
    remaining: Vec<usize>,
    /// Ready instances; lowest declaration index runs first.
    ready: BTreeSet<usize>,
    results: Vec<Option<JobResult>>,
    done: usize,
}

impl Progress {
    fn new(graph: &ExecutionGraph) -> Self {
        let remaining: Vec<usize> = (0..graph.len())
            .map(|idx| graph.predecessors(idx).len())
            .collect();
        let mut states = vec![NodeState::Pending; graph.len()];
        let mut ready = BTreeSet::new();
        for (idx, count) in remaining.iter().enumerate() {
            if *count == 0 {
                states[idx] = NodeState::Ready;
                ready.insert(idx);
            }
        }

        Self {
            states,
            remaining,
            ready,
            results: vec![None; graph.len()],
            done: 0,
        }
    }

    fn finished(&self) -> bool {
        self.done == self.states.len()
    }

    fn next_ready(&mut self) -> Option<usize> {
        let idx = self.ready.pop_first()?;
        self.states[idx] = NodeState::Running;
        Some(idx)
    }

    /// Record a finished instance and release or skip its dependents.
    /// Returns skip events for instances that will never run.
    fn complete(&mut self, graph: &ExecutionGraph, run_id: RunId, idx: usize, result: JobResult) -> Vec<RunEvent> {
        let satisfied = result.satisfies_dependents();
        self.states[idx] = NodeState::Done;
        self.results[idx] = Some(result);
        self.done += 1;

        if satisfied {
            for succ in graph.successors(idx) {
                self.remaining[succ] -= 1;
                if self.remaining[succ] == 0 && self.states[succ] == NodeState::Pending {
                    self.states[succ] = NodeState::Ready;
                    self.ready.insert(succ);
                }
            }
            return Vec::new();
        }

        self.skip_downstream(graph, run_id, idx)
    }

    fn skip_downstream(&mut self, graph: &ExecutionGraph, run_id: RunId, origin: usize) -> Vec<RunEvent> {
        let upstream = graph.instance(origin).id.clone();
        let mut events = Vec::new();
        let mut queue: VecDeque<usize> = graph.successors(origin).into();

        while let Some(idx) = queue.pop_front() {
            if self.states[idx] == NodeState::Done {
                continue;
            }
            let instance = graph.instance(idx);
            debug!(job = %instance.id, upstream = %upstream, "Skipping job");

            self.states[idx] = NodeState::Done;
            self.results[idx] = Some(JobResult::skipped(instance, upstream.clone()));
            self.done += 1;
            events.push(RunEvent::JobSkipped {
                run_id,
                instance: instance.id.clone(),
                upstream: upstream.clone(),
            });
            queue.extend(graph.successors(idx));
        }

        events
    }
}

/// State shared by the workers of one run.
struct RunState {
    run_id: RunId,
    graph: Arc<ExecutionGraph>,
    executor: Arc<JobExecutor>,
    cache: Arc<CacheResolver>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    progress: Mutex<Progress>,
    wake: Notify,
}

impl RunState {
    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Runs every instance of a graph once, respecting dependencies and the
/// concurrency bound.
pub struct Scheduler {
    config: SchedulerConfig,
    executor: Arc<JobExecutor>,
    cache: Arc<CacheResolver>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, executor: Arc<JobExecutor>, cache: Arc<CacheResolver>) -> Self {
        Self {
            config,
            executor,
            cache,
            events: None,
        }
    }

    /// Publish job progress on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Drive the graph to completion. Returns one result per instance, in
    /// declaration order.
    pub async fn run(&self, run_id: RunId, graph: Arc<ExecutionGraph>) -> Vec<JobResult> {
        if graph.is_empty() {
            return Vec::new();
        }

        let workers = self.config.max_concurrency.max(1).min(graph.len());
        info!(run_id = %run_id, jobs = graph.len(), workers, "Scheduling jobs");

        let state = Arc::new(RunState {
            run_id,
            progress: Mutex::new(Progress::new(&graph)),
            graph,
            executor: self.executor.clone(),
            cache: self.cache.clone(),
            events: self.events.clone(),
            wake: Notify::new(),
        });

        let mut join_set = JoinSet::new();
        for worker in 0..workers {
            join_set.spawn(work(worker, state.clone()));
        }
        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!(run_id = %run_id, error = %e, "Scheduler worker failed");
            }
        }

        let mut progress = state.progress.lock().await;
        std::mem::take(&mut progress.results)
            .into_iter()
            .flatten()
            .collect()
    }
}

async fn work(worker: usize, state: Arc<RunState>) {
    loop {
        let idx = {
            let mut progress = state.progress.lock().await;
            if progress.finished() {
                break;
            }
            match progress.next_ready() {
                Some(idx) => idx,
                None => {
                    // Registered while the lock is held so a completion
                    // between unlock and await still wakes this worker.
                    let notified = state.wake.notified();
                    drop(progress);
                    notified.await;
                    continue;
                }
            }
        };

        let instance = state.graph.instance(idx);
        debug!(worker, job = %instance.id, "Starting job");

        let result = match AssertUnwindSafe(run_job(&state, instance)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(worker, job = %instance.id, %message, "Job panicked");
                JobResult::crashed(instance, message)
            }
        };

        state.emit(RunEvent::JobFinished {
            run_id: state.run_id,
            instance: instance.id.clone(),
            status: result.status,
            non_blocking: result.non_blocking,
            duration_ms: result.duration_ms,
        });

        let skipped = {
            let mut progress = state.progress.lock().await;
            progress.complete(&state.graph, state.run_id, idx, result)
        };
        for event in skipped {
            state.emit(event);
        }
        state.wake.notify_waiters();
    }
}

/// Resolve the cache, run the commands and record fresh artifacts.
async fn run_job(state: &RunState, instance: &JobInstance) -> JobResult {
    let decision = state.cache.resolve(instance).await;
    state.emit(RunEvent::JobStarted {
        run_id: state.run_id,
        instance: instance.id.clone(),
        cache_hit: decision.as_ref().map(|d| d.hit),
    });

    let result = state.executor.run(instance, decision.as_ref()).await;

    if let Some(decision) = &decision
        && !decision.hit
        && result.is_success()
        && !instance.is_tolerant()
    {
        state.cache.record(instance, &decision.key).await;
    }
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "job panicked".to_string()
    }
}
