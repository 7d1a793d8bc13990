//! Parsing and serialization tests for gantry-core types.

use chrono::Utc;
use gantry_core::ids::*;
use gantry_core::pipeline::*;
use gantry_core::run::*;
use gantry_core::trigger::*;
use pretty_assertions::assert_eq;

const PIPELINE: &str = r#"
name: ci
triggers:
  - type: push
    branches: [master]
  - type: pull_request
jobs:
  - name: test
    matrix:
      axes:
        rust: [stable, beta, nightly]
        os: [linux, 1.70, true]
      tolerate:
        - rust: nightly
    commands:
      - cargo build --verbose
      - run: cargo test
        kind: verify
  - name: build
    depends_on: [test]
    cache:
      key: cargo
      files: [Cargo.lock]
    commands:
      - name: compile
        run: cargo build --release
        kind: build
      - cargo test --release
"#;

#[test]
fn test_pipeline_yaml_parses() {
    let def: PipelineDefinition = serde_yaml::from_str(PIPELINE).expect("parse");

    assert_eq!(def.name, "ci");
    assert_eq!(def.triggers.len(), 2);
    assert_eq!(def.triggers[1].kind, TriggerKind::PullRequest);
    assert!(def.triggers[1].branches.is_empty());
    assert_eq!(def.jobs.len(), 2);
}

#[test]
fn test_matrix_axes_keep_declaration_order() {
    let def: PipelineDefinition = serde_yaml::from_str(PIPELINE).expect("parse");
    let matrix = def.jobs[0].matrix.as_ref().expect("matrix");

    let names: Vec<&str> = matrix.axes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["rust", "os"]);

    let os: Vec<&str> = matrix.axes.0[1].values.iter().map(|v| v.as_str()).collect();
    assert_eq!(os, vec!["linux", "1.7", "true"]);

    assert_eq!(
        matrix.tolerate[0].get("rust").map(|v| v.as_str()),
        Some("nightly")
    );
}

#[test]
fn test_commands_accept_plain_and_detailed_forms() {
    let def: PipelineDefinition = serde_yaml::from_str(PIPELINE).expect("parse");

    let test = def.job("test").expect("test job");
    assert_eq!(test.commands[0], CommandSpec::verify("cargo build --verbose"));
    assert_eq!(test.commands[1].kind, CommandKind::Verify);

    let build = def.job("build").expect("build job");
    assert_eq!(build.commands[0].kind, CommandKind::Build);
    assert_eq!(build.commands[0].label(), "compile");
    assert_eq!(build.commands[1].label(), "cargo test --release");
    assert_eq!(build.policy, FailurePolicy::Blocking);
    assert_eq!(build.depends_on, vec!["test".to_string()]);
}

#[test]
fn test_report_json_roundtrip() {
    let report = RunReport {
        run_id: RunId::new(),
        pipeline: "ci".to_string(),
        verdict: Verdict::Fail,
        event: TriggerEvent::push("master").with_commit("abc123"),
        summary: RunSummary {
            total: 1,
            failed: 1,
            ..Default::default()
        },
        jobs: vec![JobResult {
            instance: InstanceId::new("fmt"),
            template: "fmt".to_string(),
            index: 0,
            assignment: vec![],
            status: JobStatus::Failure,
            non_blocking: false,
            output: "$ cargo fmt --check\nDiff in src/lib.rs\n".to_string(),
            duration_ms: 12,
            failure: Some(FailureKind::CommandFailed {
                command: "cargo fmt --check".to_string(),
                exit_code: 1,
            }),
            skipped_because: None,
            cache: None,
            started_at: Some(Utc::now()),
            finished_at: Utc::now(),
        }],
        started_at: Utc::now(),
        completed_at: Utc::now(),
        duration_ms: 12,
    };

    let json = serde_json::to_string(&report).expect("serialize");
    assert!(json.contains(r#""verdict":"fail""#));
    assert!(json.contains(r#""type":"command_failed""#));

    let parsed: RunReport = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed.run_id, report.run_id);
    assert_eq!(parsed.jobs[0].failure, report.jobs[0].failure);
    assert_eq!(parsed.event, report.event);
}
