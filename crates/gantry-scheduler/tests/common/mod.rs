//! Shared fakes and fixtures for orchestration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use gantry_core::Result;
use gantry_core::events::RunEvent;
use gantry_core::pipeline::PipelineDefinition;
use gantry_core::ports::{CommandExecutor, CommandOutput, CommandRequest, ReportSink};
use gantry_core::run::RunReport;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

type Rule<T> = Box<dyn Fn(&CommandRequest) -> T + Send + Sync>;

/// A command executor that never spawns processes.
///
/// - records `"<job>: <command>"` for every command it is handed
/// - exits 1 for requests matching the failure rule, 0 otherwise
/// - optionally sleeps per request to shuffle completion order
/// - tracks the peak number of commands in flight
pub struct FakeCommands {
    issued: Mutex<Vec<String>>,
    fail_when: Rule<bool>,
    delay_for: Rule<Option<Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeCommands {
    pub fn new() -> Self {
        Self {
            issued: Mutex::new(Vec::new()),
            fail_when: Box::new(|_| false),
            delay_for: Box::new(|_| None),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn fail_when(mut self, rule: impl Fn(&CommandRequest) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Box::new(rule);
        self
    }

    pub fn delay_for(
        mut self,
        rule: impl Fn(&CommandRequest) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.delay_for = Box::new(rule);
        self
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    /// Whether any command was issued on behalf of `job`.
    pub fn ran(&self, job: &str) -> bool {
        let prefix = format!("{}: ", job);
        self.issued().iter().any(|line| line.starts_with(&prefix))
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for FakeCommands {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let job = request.env.get("GANTRY_JOB").cloned().unwrap_or_default();
        self.issued
            .lock()
            .unwrap()
            .push(format!("{}: {}", job, request.command));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = (self.delay_for)(request) {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = (self.fail_when)(request);
        Ok(CommandOutput {
            exit_code: if failed { 1 } else { 0 },
            output: format!("{}\n", if failed { "error" } else { "ok" }),
            duration_ms: 0,
            timed_out: false,
        })
    }
}

/// Matrix value the request was issued for.
pub fn axis<'a>(request: &'a CommandRequest, name: &str) -> Option<&'a str> {
    request
        .env
        .get(&format!("MATRIX_{}", name.to_ascii_uppercase()))
        .map(String::as_str)
}

/// Collects published reports.
#[derive(Default)]
pub struct CollectingSink {
    pub reports: Mutex<Vec<RunReport>>,
}

#[async_trait]
impl ReportSink for CollectingSink {
    async fn publish(&self, report: &RunReport) -> Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// A sink whose backend is always down.
pub struct BrokenSink;

#[async_trait]
impl ReportSink for BrokenSink {
    async fn publish(&self, _report: &RunReport) -> Result<()> {
        Err(gantry_core::Error::ReportSink("status API unreachable".to_string()))
    }
}

pub fn pipeline(yaml: &str) -> PipelineDefinition {
    serde_yaml::from_str(yaml).expect("valid pipeline yaml")
}

pub fn drain(mut rx: mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn shared(commands: FakeCommands) -> Arc<FakeCommands> {
    Arc::new(commands)
}
