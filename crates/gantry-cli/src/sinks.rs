//! Report sinks provided by the CLI.

use async_trait::async_trait;
use console::style;
use gantry_core::ports::ReportSink;
use gantry_core::run::{JobStatus, RunReport};
use gantry_core::{Error, Result};
use std::path::PathBuf;

/// Prints a per-job summary table and the verdict.
pub struct ConsoleSink;

#[async_trait]
impl ReportSink for ConsoleSink {
    async fn publish(&self, report: &RunReport) -> Result<()> {
        println!();
        for job in &report.jobs {
            let marker = match job.status {
                JobStatus::Success => style("✓").green(),
                JobStatus::Failure if job.non_blocking => style("!").yellow(),
                JobStatus::Failure => style("✗").red(),
                JobStatus::Skipped => style("-").dim(),
            };
            let detail = match (&job.status, &job.skipped_because) {
                (JobStatus::Skipped, Some(upstream)) => format!("skipped, {} failed", upstream),
                (JobStatus::Failure, _) if job.non_blocking => "failed, tolerated".to_string(),
                _ => format!("{:.2}s", job.duration_ms as f64 / 1000.0),
            };
            println!("  {} {} {}", marker, job.instance, style(detail).dim());
        }

        let summary = &report.summary;
        println!(
            "\n  {} passed, {} failed, {} tolerated, {} skipped",
            summary.succeeded, summary.failed, summary.tolerated, summary.skipped
        );

        if report.verdict.is_pass() {
            println!(
                "{} Pipeline {} passed in {:.2}s",
                style("✓").green().bold(),
                style(&report.pipeline).bold(),
                report.duration_ms as f64 / 1000.0
            );
        } else {
            println!(
                "{} Pipeline {} failed after {:.2}s",
                style("✗").red().bold(),
                style(&report.pipeline).bold(),
                report.duration_ms as f64 / 1000.0
            );
        }
        Ok(())
    }
}

/// Writes the report as pretty JSON.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn publish(&self, report: &RunReport) -> Result<()> {
        let json = serde_json::to_vec_pretty(report)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| Error::ReportSink(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gantry_core::ids::RunId;
    use gantry_core::run::{RunSummary, Verdict};
    use gantry_core::trigger::TriggerEvent;

    fn report() -> RunReport {
        RunReport {
            run_id: RunId::new(),
            pipeline: "ci".to_string(),
            verdict: Verdict::Pass,
            event: TriggerEvent::push("main"),
            summary: RunSummary::default(),
            jobs: vec![],
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_json_sink_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let report = report();

        JsonFileSink::new(&path).publish(&report).await.unwrap();

        let written: RunReport =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written.run_id, report.run_id);
        assert_eq!(written.verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_json_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let result = JsonFileSink::new(blocker.join("run.json"))
            .publish(&report())
            .await;
        assert!(result.is_err());
    }
}
