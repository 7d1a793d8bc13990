//! Structural validation of pipeline definitions.

use gantry_core::pipeline::{AxisFilter, JobTemplate, MatrixAxes, PipelineDefinition};
use gantry_core::{Error, Result};
use std::collections::HashSet;

/// Validate a definition before it is planned. All problems found are
/// reported together.
pub fn validate(pipeline: &PipelineDefinition) -> Result<()> {
    let mut problems = Vec::new();

    if pipeline.name.trim().is_empty() {
        problems.push("pipeline name is empty".to_string());
    }
    if pipeline.jobs.is_empty() {
        problems.push("pipeline has no jobs".to_string());
    }

    let mut seen = HashSet::new();
    for job in &pipeline.jobs {
        if job.name.trim().is_empty() {
            problems.push("job with empty name".to_string());
            continue;
        }
        if !seen.insert(job.name.as_str()) {
            problems.push(format!("duplicate job name '{}'", job.name));
        }
        validate_job(job, &mut problems);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidPipeline(problems.join("; ")))
    }
}

fn validate_job(job: &JobTemplate, problems: &mut Vec<String>) {
    if job.commands.is_empty() {
        problems.push(format!("job '{}' has no commands", job.name));
    }
    if job.commands.iter().any(|c| c.run.trim().is_empty()) {
        problems.push(format!("job '{}' has an empty command", job.name));
    }
    if job.depends_on.iter().any(|dep| dep == &job.name) {
        problems.push(format!("job '{}' depends on itself", job.name));
    }
    if job.timeout_minutes == Some(0) {
        problems.push(format!("job '{}' has a zero timeout", job.name));
    }
    if let Some(cache) = &job.cache
        && cache.key.trim().is_empty()
    {
        problems.push(format!("job '{}' has an empty cache key", job.name));
    }

    let Some(matrix) = &job.matrix else {
        return;
    };

    let mut axes = HashSet::new();
    for axis in matrix.axes.iter() {
        if !axes.insert(axis.name.as_str()) {
            problems.push(format!(
                "job '{}' declares axis '{}' twice",
                job.name, axis.name
            ));
        }
        let mut values = HashSet::new();
        for value in &axis.values {
            if !values.insert(value.as_str()) {
                problems.push(format!(
                    "job '{}' axis '{}' lists value '{}' twice",
                    job.name, axis.name, value
                ));
            }
        }
    }

    let filters = matrix
        .exclude
        .iter()
        .map(|f| ("exclude", f))
        .chain(matrix.tolerate.iter().map(|f| ("tolerate", f)));
    for (section, filter) in filters {
        check_filter(job, section, filter, &matrix.axes, problems);
    }
}

fn check_filter(
    job: &JobTemplate,
    section: &str,
    filter: &AxisFilter,
    axes: &MatrixAxes,
    problems: &mut Vec<String>,
) {
    if filter.is_empty() {
        problems.push(format!("job '{}' has an empty {} entry", job.name, section));
    }
    for key in filter.keys() {
        if !axes.contains(key) {
            problems.push(format!(
                "job '{}' {} entry names unknown axis '{}'",
                job.name, section, key
            ));
        }
    }
}
