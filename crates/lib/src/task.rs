//! Build planning: from a crawled sandbox to executable tasks.
//!
//! A [`BuildTask`] pairs a spec with its fully composed environment and its
//! rendered commands. Tasks are created once per spec by a memoized
//! topological fold and consumed by the driver; the task graph mirrors the
//! spec graph, with shared subgraphs shared.
//!
//! The crawler can only produce DAGs, but the planner still verifies
//! acyclicity over the id-keyed edge set before folding so a corrupted graph
//! fails fast instead of diverging.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use thiserror::Error;
use tracing::debug;

use crate::config::BuildConfig;
use crate::env::{self, SpecEnv};
use crate::expand;
use crate::graph::{self, Node};
use crate::sandbox::{BuildSandbox, BuildSpec};

/// A build command in both its manifest and its rendered form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  /// The string as authored in the manifest.
  pub raw: String,

  /// The string after shell-style expansion against the task environment.
  pub rendered: String,
}

/// One schedulable build: a spec plus everything needed to run it.
#[derive(Debug)]
pub struct BuildTask {
  /// Copied from the spec.
  pub id: String,

  pub spec: Arc<BuildSpec>,

  /// Fully-substituted environment, in composition order.
  pub env: IndexMap<String, String>,

  /// Commands to run sequentially.
  pub command: Vec<Command>,

  /// Direct dependency tasks in declaration order.
  pub dependencies: Vec<Arc<BuildTask>>,
}

impl Node for BuildTask {
  fn id(&self) -> &str {
    &self.id
  }

  fn dependencies(&self) -> &[Arc<Self>] {
    &self.dependencies
  }
}

/// Errors during planning.
#[derive(Debug, Error)]
pub enum PlanError {
  /// The spec graph contains a back-edge. The crawler cannot produce one;
  /// seeing this means the graph was constructed by hand and is invalid.
  #[error("dependency cycle detected in build graph")]
  CycleDetected,
}

impl BuildTask {
  /// Plan the whole sandbox: compute every spec's environment contribution,
  /// then fold specs into tasks bottom-up.
  pub fn plan(sandbox: &BuildSandbox, config: &BuildConfig) -> Result<Arc<BuildTask>, PlanError> {
    verify_acyclic(&sandbox.root)?;

    let envs = env::spec_environments(sandbox, config);

    let root = graph::topological_fold(
      &sandbox.root,
      &mut |direct: &[Arc<BuildTask>], _all: &[Arc<BuildTask>], spec: &Arc<BuildSpec>| {
        let task = plan_task(spec, direct, &envs, sandbox, config);
        debug!(id = %task.id, commands = task.command.len(), "planned task");
        task
      },
    );

    Ok(root)
  }
}

fn plan_task(
  spec: &Arc<BuildSpec>,
  direct_tasks: &[Arc<BuildTask>],
  envs: &IndexMap<String, SpecEnv>,
  sandbox: &BuildSandbox,
  config: &BuildConfig,
) -> Arc<BuildTask> {
  let own = &envs[&spec.id];
  let direct: Vec<&SpecEnv> = spec.dependencies.iter().map(|dep| &envs[&dep.id]).collect();
  let transitive_specs = graph::collect_transitive_dependencies(spec);
  let transitive: Vec<&SpecEnv> = transitive_specs.iter().map(|dep| &envs[&dep.id]).collect();

  let env = env::assemble_task_env(own, spec, &direct, &transitive, config, &sandbox.initial_env);

  let command = spec
    .command
    .as_deref()
    .unwrap_or_default()
    .iter()
    .map(|raw| Command {
      raw: raw.clone(),
      rendered: expand::expand(raw, |name| env.get(name).cloned()),
    })
    .collect();

  Arc::new(BuildTask {
    id: spec.id.clone(),
    spec: Arc::clone(spec),
    env,
    command,
    dependencies: direct_tasks.to_vec(),
  })
}

/// Fast-fail back-edge check over the id-keyed edge set.
fn verify_acyclic(root: &Arc<BuildSpec>) -> Result<(), PlanError> {
  let mut edges = DiGraph::<String, ()>::new();
  let mut nodes = HashMap::new();

  graph::traverse_breadth_first(root, |spec| {
    let idx = *nodes
      .entry(spec.id.clone())
      .or_insert_with(|| edges.add_node(spec.id.clone()));
    for dep in spec.dependencies() {
      let dep_idx = *nodes
        .entry(dep.id.clone())
        .or_insert_with(|| edges.add_node(dep.id.clone()));
      edges.add_edge(dep_idx, idx, ());
    }
  });

  toposort(&edges, None).map_err(|_| PlanError::CycleDetected)?;
  Ok(())
}
