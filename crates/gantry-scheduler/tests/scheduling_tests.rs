//! Ordering, concurrency and error-propagation properties of a run.

mod common;

use common::{BrokenSink, CollectingSink, FakeCommands, drain, pipeline, shared};
use gantry_core::Error;
use gantry_core::events::RunEvent;
use gantry_core::ids::InstanceId;
use gantry_core::run::{JobStatus, Verdict};
use gantry_core::trigger::TriggerEvent;
use gantry_scheduler::{Orchestrator, OrchestratorConfig};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn orchestrator(commands: Arc<FakeCommands>, max_concurrency: usize) -> Orchestrator {
    Orchestrator::new(
        OrchestratorConfig {
            max_concurrency,
            workspace: std::env::temp_dir(),
            default_timeout: None,
        },
        commands,
    )
}

const DIAMOND: &str = r#"
name: diamond
jobs:
  - name: checkout
    commands: [git status]
  - name: lint
    depends_on: [checkout]
    commands: [cargo clippy]
  - name: test
    depends_on: [checkout]
    matrix:
      axes:
        channel: [stable, beta, nightly]
    commands: [cargo test]
  - name: package
    depends_on: [lint, test]
    commands: [cargo package]
  - name: docs
    commands: [cargo doc]
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependents_start_only_after_predecessors_finish() {
    let commands = shared(FakeCommands::new().delay_for(|req| {
        (req.command == "cargo clippy").then(|| Duration::from_millis(30))
    }));
    let (tx, rx) = mpsc::unbounded_channel();
    let definition = pipeline(DIAMOND);

    let report = orchestrator(commands, 3)
        .with_events(tx)
        .run(&definition, TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.verdict, Verdict::Pass);

    let events = drain(rx);
    let mut started = HashMap::new();
    let mut finished = HashMap::new();
    for (pos, event) in events.iter().enumerate() {
        match event {
            RunEvent::JobStarted { instance, .. } => {
                started.insert(instance.clone(), pos);
            }
            RunEvent::JobFinished { instance, .. } => {
                finished.insert(instance.clone(), pos);
            }
            _ => {}
        }
    }

    let graph = orchestrator(shared(FakeCommands::new()), 1)
        .plan(&definition)
        .unwrap();
    for instance in graph.instances() {
        for predecessor in &instance.predecessors {
            assert!(
                finished[predecessor] < started[&instance.id],
                "{} started before {} finished",
                instance.id,
                predecessor
            );
        }
    }

    assert!(matches!(events.first(), Some(RunEvent::RunStarted { jobs: 7, .. })));
    assert!(matches!(events.last(), Some(RunEvent::RunCompleted { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_bound() {
    let definition = pipeline(
        r#"
name: wide
jobs:
  - name: test
    matrix:
      axes:
        shard: [1, 2, 3, 4, 5, 6, 7, 8]
    commands: [cargo nextest run]
"#,
    );
    let commands = shared(FakeCommands::new().delay_for(|_| Some(Duration::from_millis(20))));

    let report = orchestrator(commands.clone(), 3)
        .run(&definition, TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.summary.succeeded, 8);
    assert!(commands.peak() <= 3, "peak was {}", commands.peak());
    assert!(commands.peak() >= 2);
}

#[tokio::test]
async fn single_worker_dispatches_in_declaration_order() {
    let commands = shared(FakeCommands::new());

    orchestrator(commands.clone(), 1)
        .run(&pipeline(DIAMOND), TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        commands.issued(),
        vec![
            "checkout: git status",
            "lint: cargo clippy",
            "test (channel=stable): cargo test",
            "test (channel=beta): cargo test",
            "test (channel=nightly): cargo test",
            "package: cargo package",
            "docs: cargo doc",
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn report_order_ignores_completion_timing() {
    let definition = pipeline(DIAMOND);

    let fast_first = shared(FakeCommands::new().delay_for(|req| {
        (req.command == "cargo doc").then(|| Duration::from_millis(40))
    }));
    let slow_first = shared(FakeCommands::new().delay_for(|req| {
        (req.command == "cargo test").then(|| Duration::from_millis(40))
    }));

    let a = orchestrator(fast_first, 4)
        .run(&definition, TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();
    let b = orchestrator(slow_first, 4)
        .run(&definition, TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();

    let order = |report: &gantry_core::run::RunReport| -> Vec<InstanceId> {
        report.jobs.iter().map(|j| j.instance.clone()).collect()
    };
    assert_eq!(order(&a), order(&b));
    assert_eq!(a.verdict, b.verdict);
    let indices: Vec<usize> = a.jobs.iter().map(|j| j.index).collect();
    assert_eq!(indices, (0..7).collect::<Vec<_>>());
}

#[tokio::test]
async fn cascade_skip_reaches_transitive_dependents() {
    let commands = shared(FakeCommands::new().fail_when(|req| req.command == "git status"));
    let (tx, rx) = mpsc::unbounded_channel();

    let report = orchestrator(commands.clone(), 1)
        .with_events(tx)
        .run(&pipeline(DIAMOND), TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.skipped, 5);
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.job("docs").unwrap().status, JobStatus::Success);
    assert_eq!(
        commands.issued(),
        vec!["checkout: git status", "docs: cargo doc"]
    );

    let skipped = drain(rx)
        .into_iter()
        .filter(|e| matches!(e, RunEvent::JobSkipped { .. }))
        .count();
    assert_eq!(skipped, 5);
}

#[tokio::test]
async fn tolerated_failures_do_not_gate_dependents() {
    let definition = pipeline(
        r#"
name: ci
jobs:
  - name: audit
    policy: tolerant
    commands: [cargo audit]
  - name: release
    depends_on: [audit]
    commands: [cargo publish --dry-run]
"#,
    );
    let commands = shared(FakeCommands::new().fail_when(|req| req.command == "cargo audit"));

    let report = orchestrator(commands, 2)
        .run(&definition, TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.job("audit").unwrap().status, JobStatus::Failure);
    assert_eq!(report.job("release").unwrap().status, JobStatus::Success);
    assert_eq!(report.verdict, Verdict::Pass);
}

#[tokio::test]
async fn unmatched_trigger_runs_nothing() {
    let definition = pipeline(
        r#"
name: ci
triggers:
  - type: push
    branches: [master]
jobs:
  - name: test
    commands: [cargo test]
"#,
    );
    let commands = shared(FakeCommands::new());
    let orchestrator = orchestrator(commands.clone(), 2);

    let pushed = orchestrator
        .run(&definition, TriggerEvent::push("feature/x"))
        .await
        .unwrap();
    let pull = orchestrator
        .run(&definition, TriggerEvent::pull_request("feature/x", "master"))
        .await
        .unwrap();

    assert!(pushed.is_none());
    assert!(pull.is_none());
    assert!(commands.issued().is_empty());
}

#[tokio::test]
async fn graph_errors_abort_before_dispatch() {
    let cyclic = pipeline(
        r#"
name: ci
jobs:
  - name: a
    depends_on: [c]
    commands: [echo a]
  - name: b
    depends_on: [a]
    commands: [echo b]
  - name: c
    depends_on: [b]
    commands: [echo c]
  - name: d
    commands: [echo d]
"#,
    );
    let unknown = pipeline(
        r#"
name: ci
jobs:
  - name: build
    depends_on: [tset]
    commands: [cargo build]
"#,
    );
    let commands = shared(FakeCommands::new());
    let orchestrator = orchestrator(commands.clone(), 2);

    let err = orchestrator
        .run(&cyclic, TriggerEvent::push("master"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Graph(gantry_core::GraphError::CycleDetected(ref names)) if names == &["a", "b", "c"]
    ));

    let err = orchestrator
        .run(&unknown, TriggerEvent::push("master"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Graph(gantry_core::GraphError::UnknownPredecessor { .. })
    ));
    assert!(err.is_definition_error());

    assert!(commands.issued().is_empty());
}

#[tokio::test]
async fn invalid_definition_is_rejected() {
    let definition = pipeline(
        r#"
name: ci
jobs:
  - name: test
    commands: []
"#,
    );
    let commands = shared(FakeCommands::new());

    let err = orchestrator(commands.clone(), 2)
        .run(&definition, TriggerEvent::push("master"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidPipeline(_)));
    assert!(commands.issued().is_empty());
}

#[tokio::test]
async fn reports_reach_every_sink_even_when_one_fails() {
    let collecting = Arc::new(CollectingSink::default());
    let commands = shared(FakeCommands::new());

    let report = orchestrator(commands, 2)
        .with_sink(Arc::new(BrokenSink))
        .with_sink(collecting.clone())
        .run(&pipeline(DIAMOND), TriggerEvent::push("master"))
        .await
        .unwrap()
        .unwrap();

    let published = collecting.reports.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].run_id, report.run_id);
}

struct CrashingCommands;

#[async_trait::async_trait]
impl gantry_core::ports::CommandExecutor for CrashingCommands {
    async fn execute(
        &self,
        request: &gantry_core::ports::CommandRequest,
    ) -> gantry_core::Result<gantry_core::ports::CommandOutput> {
        if request.command == "cargo clippy" {
            panic!("lint runner crashed");
        }
        Ok(gantry_core::ports::CommandOutput::default())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crashing_job_fails_the_run_without_hanging() {
    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            max_concurrency: 3,
            workspace: std::env::temp_dir(),
            default_timeout: None,
        },
        Arc::new(CrashingCommands),
    );

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run(&pipeline(DIAMOND), TriggerEvent::push("master")),
    )
    .await
    .expect("run completes")
    .unwrap()
    .unwrap();

    assert_eq!(report.jobs.len(), 7);
    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.job("lint").unwrap().status, JobStatus::Failure);
    assert_eq!(report.job("package").unwrap().status, JobStatus::Skipped);
    assert_eq!(report.job("docs").unwrap().status, JobStatus::Success);
}
