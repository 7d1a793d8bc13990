//! Matrix expansion for parallel job generation.

use gantry_core::ids::InstanceId;
use gantry_core::pipeline::{AxisFilter, FailurePolicy, JobTemplate, MatrixAxes, PipelineDefinition};
use gantry_core::run::{Assignment, JobInstance};
use tracing::debug;

/// Expander for matrix configurations.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand every template of a pipeline, numbering instances in
    /// declaration order.
    pub fn expand_all(&self, pipeline: &PipelineDefinition) -> Vec<JobInstance> {
        let mut instances = Vec::new();
        for template in &pipeline.jobs {
            for mut instance in self.expand(template) {
                instance.index = instances.len();
                instances.push(instance);
            }
        }
        instances
    }

    /// Expand one template into its instances, in row-major order over the
    /// axes as declared. Indices are local to the template.
    pub fn expand(&self, template: &JobTemplate) -> Vec<JobInstance> {
        let Some(matrix) = template.matrix.as_ref() else {
            return vec![self.instantiate(template, Vec::new(), template.policy, 0)];
        };

        let mut combinations = self.generate_combinations(&matrix.axes);

        if combinations.is_empty() {
            debug!(job = %template.name, "Matrix axis without values, no instances");
            return Vec::new();
        }

        // Apply excludes
        combinations.retain(|combo| {
            !matrix
                .exclude
                .iter()
                .any(|exclude| self.matches_filter(combo, exclude))
        });

        combinations
            .into_iter()
            .enumerate()
            .map(|(idx, assignment)| {
                let tolerated = matrix
                    .tolerate
                    .iter()
                    .any(|filter| self.matches_filter(&assignment, filter));
                let policy = if tolerated {
                    FailurePolicy::Tolerant
                } else {
                    template.policy
                };
                self.instantiate(template, assignment, policy, idx)
            })
            .collect()
    }

    fn instantiate(
        &self,
        template: &JobTemplate,
        assignment: Assignment,
        policy: FailurePolicy,
        index: usize,
    ) -> JobInstance {
        let id = InstanceId::for_assignment(
            &template.name,
            assignment.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );

        JobInstance {
            id,
            template: template.name.clone(),
            index,
            assignment,
            commands: template.commands.clone(),
            policy,
            cache: template.cache.clone(),
            timeout_minutes: template.timeout_minutes,
            variables: template.variables.clone(),
            depends_on: template.depends_on.clone(),
            predecessors: Vec::new(),
        }
    }

    fn generate_combinations(&self, axes: &MatrixAxes) -> Vec<Assignment> {
        let mut result: Vec<Assignment> = vec![Vec::new()];

        for axis in axes.iter() {
            let mut new_result = Vec::with_capacity(result.len() * axis.values.len());

            for combo in &result {
                for value in &axis.values {
                    let mut new_combo = combo.clone();
                    new_combo.push((axis.name.clone(), value.as_str().to_string()));
                    new_result.push(new_combo);
                }
            }

            result = new_result;
        }

        result
    }

    fn matches_filter(&self, combo: &Assignment, filter: &AxisFilter) -> bool {
        filter.iter().all(|(key, value)| {
            combo
                .iter()
                .any(|(axis, assigned)| axis == key && assigned == value.as_str())
        })
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}
