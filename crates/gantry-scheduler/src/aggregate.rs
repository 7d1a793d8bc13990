//! Folding job results into a run report.

use chrono::{DateTime, Utc};
use gantry_core::ids::RunId;
use gantry_core::run::{JobResult, JobStatus, RunReport, RunSummary, Verdict};
use gantry_core::trigger::TriggerEvent;

/// Run metadata carried into the report.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub pipeline: String,
    pub event: TriggerEvent,
    pub started_at: DateTime<Utc>,
}

/// Build the report for a finished run.
///
/// The verdict fails iff some job failed without being marked
/// non-blocking. Skipped jobs never decide the verdict on their own, since
/// a skip always has a failed upstream. Jobs are listed by declaration
/// index regardless of completion order.
pub fn aggregate(context: RunContext, mut results: Vec<JobResult>) -> RunReport {
    results.sort_by_key(|job| job.index);

    let mut summary = RunSummary {
        total: results.len(),
        ..Default::default()
    };
    for job in &results {
        match job.status {
            JobStatus::Success => summary.succeeded += 1,
            JobStatus::Failure if job.non_blocking => summary.tolerated += 1,
            JobStatus::Failure => summary.failed += 1,
            JobStatus::Skipped => summary.skipped += 1,
        }
    }

    let verdict = if results.iter().any(JobResult::is_blocking_failure) {
        Verdict::Fail
    } else {
        Verdict::Pass
    };

    let completed_at = Utc::now();
    let duration_ms = (completed_at - context.started_at).num_milliseconds().max(0) as u64;

    RunReport {
        run_id: context.run_id,
        pipeline: context.pipeline,
        verdict,
        event: context.event,
        summary,
        jobs: results,
        started_at: context.started_at,
        completed_at,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::ids::InstanceId;
    use pretty_assertions::assert_eq;

    fn context() -> RunContext {
        RunContext {
            run_id: RunId::new(),
            pipeline: "ci".to_string(),
            event: TriggerEvent::push("master"),
            started_at: Utc::now(),
        }
    }

    fn result(name: &str, index: usize, status: JobStatus, non_blocking: bool) -> JobResult {
        JobResult {
            instance: InstanceId::new(name),
            template: name.to_string(),
            index,
            assignment: vec![],
            status,
            non_blocking,
            output: String::new(),
            duration_ms: 0,
            failure: None,
            skipped_because: None,
            cache: None,
            started_at: None,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_all_success_passes() {
        let report = aggregate(
            context(),
            vec![
                result("a", 0, JobStatus::Success, false),
                result("b", 1, JobStatus::Success, false),
            ],
        );
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.summary.succeeded, 2);
    }

    #[test]
    fn test_tolerated_failure_passes() {
        let report = aggregate(
            context(),
            vec![
                result("stable", 0, JobStatus::Success, false),
                result("nightly", 1, JobStatus::Failure, true),
            ],
        );
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.summary.tolerated, 1);
        assert_eq!(report.summary.failed, 0);
    }

    #[test]
    fn test_blocking_failure_fails() {
        let report = aggregate(
            context(),
            vec![
                result("build", 0, JobStatus::Failure, false),
                result("deploy", 1, JobStatus::Skipped, false),
            ],
        );
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(
            report.summary,
            RunSummary {
                total: 2,
                succeeded: 0,
                failed: 1,
                tolerated: 0,
                skipped: 1,
            }
        );
    }

    #[test]
    fn test_jobs_sorted_by_declaration_index() {
        let report = aggregate(
            context(),
            vec![
                result("c", 2, JobStatus::Success, false),
                result("a", 0, JobStatus::Success, false),
                result("b", 1, JobStatus::Success, false),
            ],
        );
        let names: Vec<&str> = report.jobs.iter().map(|j| j.instance.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_run_passes() {
        let report = aggregate(context(), vec![]);
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.summary.total, 0);
    }
}
