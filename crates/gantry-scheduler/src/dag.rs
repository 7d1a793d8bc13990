//! Dependency resolution for expanded job instances.

use crate::matrix::MatrixExpander;
use gantry_core::ids::InstanceId;
use gantry_core::pipeline::PipelineDefinition;
use gantry_core::run::JobInstance;
use gantry_core::{Error, GraphError, Result};
use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Expanded instances plus predecessor edges.
///
/// Node `i` of the graph is `instances[i]`; edges point from a predecessor
/// to its dependent.
#[derive(Debug)]
pub struct ExecutionGraph {
    instances: Vec<JobInstance>,
    graph: DiGraph<usize, ()>,
    by_template: HashMap<String, Vec<usize>>,
}

impl ExecutionGraph {
    /// All instances in declaration order.
    pub fn instances(&self) -> &[JobInstance] {
        &self.instances
    }

    pub fn instance(&self, idx: usize) -> &JobInstance {
        &self.instances[idx]
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn index_of(&self, id: &InstanceId) -> Option<usize> {
        self.instances.iter().position(|inst| &inst.id == id)
    }

    /// Instances expanded from a template.
    pub fn instances_of(&self, template: &str) -> Vec<&JobInstance> {
        self.by_template
            .get(template)
            .map(|indices| indices.iter().map(|&i| &self.instances[i]).collect())
            .unwrap_or_default()
    }

    /// Instances that must complete before `idx` can run, sorted.
    pub fn predecessors(&self, idx: usize) -> Vec<usize> {
        self.neighbors(idx, Direction::Incoming)
    }

    /// Instances waiting on `idx`, sorted.
    pub fn successors(&self, idx: usize) -> Vec<usize> {
        self.neighbors(idx, Direction::Outgoing)
    }

    /// Instances with no predecessors.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.instances.len())
            .filter(|&idx| self.predecessors(idx).is_empty())
            .collect()
    }

    /// Instance indices in a dependency-respecting order.
    pub fn topological_order(&self) -> std::result::Result<Vec<usize>, GraphError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| {
                GraphError::CycleDetected(vec![
                    self.instances[self.graph[cycle.node_id()]].id.to_string(),
                ])
            })
    }

    fn neighbors(&self, idx: usize, direction: Direction) -> Vec<usize> {
        let mut result: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(idx), direction)
            .map(|n| self.graph[n])
            .collect();
        result.sort_unstable();
        result
    }
}

/// Builder for execution graphs.
pub struct GraphBuilder {
    expander: MatrixExpander,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            expander: MatrixExpander::new(),
        }
    }

    /// Expand every template and resolve template-level dependencies to
    /// instance edges. A dependent waits on every instance of each
    /// predecessor template.
    pub fn build(&self, pipeline: &PipelineDefinition) -> Result<ExecutionGraph> {
        self.check_templates(pipeline)?;

        let mut instances = self.expander.expand_all(pipeline);

        let mut by_template: HashMap<String, Vec<usize>> = pipeline
            .jobs
            .iter()
            .map(|job| (job.name.clone(), Vec::new()))
            .collect();
        for instance in &instances {
            by_template
                .entry(instance.template.clone())
                .or_default()
                .push(instance.index);
        }

        let mut graph = DiGraph::with_capacity(instances.len(), 0);
        for instance in &instances {
            graph.add_node(instance.index);
        }

        for idx in 0..instances.len() {
            let mut predecessors = Vec::new();
            for dep in &instances[idx].depends_on {
                for &dep_idx in &by_template[dep] {
                    graph.update_edge(NodeIndex::new(dep_idx), NodeIndex::new(idx), ());
                    if !predecessors.contains(&dep_idx) {
                        predecessors.push(dep_idx);
                    }
                }
            }
            predecessors.sort_unstable();
            let resolved: Vec<InstanceId> = predecessors
                .into_iter()
                .map(|p| instances[p].id.clone())
                .collect();
            instances[idx].predecessors = resolved;
        }

        let dag = ExecutionGraph {
            instances,
            graph,
            by_template,
        };

        // Verify no cycles
        dag.topological_order()?;

        Ok(dag)
    }

    /// Reject self references, unknown predecessors and template cycles
    /// before anything is expanded.
    fn check_templates(&self, pipeline: &PipelineDefinition) -> Result<()> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut name_to_index = HashMap::new();

        for (pos, job) in pipeline.jobs.iter().enumerate() {
            let node = graph.add_node(pos);
            name_to_index.insert(job.name.as_str(), node);
        }

        for job in &pipeline.jobs {
            let job_idx = name_to_index[job.name.as_str()];
            for dep in &job.depends_on {
                if dep == &job.name {
                    return Err(Error::InvalidPipeline(format!(
                        "Job '{}' depends on itself",
                        job.name
                    )));
                }
                let dep_idx = name_to_index.get(dep.as_str()).ok_or_else(|| {
                    GraphError::UnknownPredecessor {
                        job: job.name.clone(),
                        predecessor: dep.clone(),
                    }
                })?;
                graph.update_edge(*dep_idx, job_idx, ());
            }
        }

        if let Some(component) = tarjan_scc(&graph).into_iter().find(|c| c.len() > 1) {
            let mut positions: Vec<usize> = component.iter().map(|&n| graph[n]).collect();
            positions.sort_unstable();
            let names = positions
                .into_iter()
                .map(|pos| pipeline.jobs[pos].name.clone())
                .collect();
            return Err(GraphError::CycleDetected(names).into());
        }

        Ok(())
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
