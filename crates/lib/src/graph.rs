//! Graph primitives over build-graph shaped nodes.
//!
//! Everything here is duck-typed over [`Node`]: any type exposing a stable
//! string identifier and an ordered dependency list qualifies, which lets the
//! same traversals serve both build specs and build tasks. Nodes are held by
//! `Arc` so shared subgraphs (a dependency reached through several parents)
//! stay shared rather than duplicated.
//!
//! Two fold flavors exist: [`topological_fold`] over eager values, and
//! [`topological_fold_async`] whose memo cell stores the in-flight shared
//! future, so a second reference to the same node awaits the same
//! computation instead of starting a second one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};

/// Capability set required of graph nodes.
pub trait Node {
  /// Stable identifier, unique within a build graph.
  fn id(&self) -> &str;

  /// Direct dependencies in declaration order.
  fn dependencies(&self) -> &[Arc<Self>];
}

/// Visit each node exactly once, breadth-first from the root.
///
/// Siblings are visited in declaration order.
pub fn traverse_breadth_first<N: Node>(root: &Arc<N>, mut visit: impl FnMut(&Arc<N>)) {
  let mut seen: HashSet<String> = HashSet::new();
  let mut queue: VecDeque<Arc<N>> = VecDeque::new();

  seen.insert(root.id().to_string());
  queue.push_back(Arc::clone(root));

  while let Some(node) = queue.pop_front() {
    visit(&node);
    for dep in node.dependencies() {
      if seen.insert(dep.id().to_string()) {
        queue.push_back(Arc::clone(dep));
      }
    }
  }
}

/// Visit each node exactly once in post-order (dependencies first).
///
/// Siblings are visited in declaration order.
pub fn traverse_depth_first<N: Node>(root: &Arc<N>, mut visit: impl FnMut(&Arc<N>)) {
  let mut seen: HashSet<String> = HashSet::new();
  visit_post_order(root, &mut seen, &mut visit);
}

fn visit_post_order<N: Node>(node: &Arc<N>, seen: &mut HashSet<String>, visit: &mut impl FnMut(&Arc<N>)) {
  if !seen.insert(node.id().to_string()) {
    return;
  }
  for dep in node.dependencies() {
    visit_post_order(dep, seen, visit);
  }
  visit(node);
}

/// Collect the transitive dependencies of `root`, excluding the root itself.
///
/// The result is a topological order with leaves first: every element
/// precedes all of its transitive dependents. Repeated runs over the same
/// graph yield the same sequence.
pub fn collect_transitive_dependencies<N: Node>(root: &Arc<N>) -> Vec<Arc<N>> {
  let root_id = root.id().to_string();
  let mut deps = Vec::new();
  traverse_depth_first(root, |node| {
    if node.id() != root_id {
      deps.push(Arc::clone(node));
    }
  });
  deps
}

/// Fold the graph bottom-up, computing exactly one value per distinct id.
///
/// The fold function receives the values of the node's direct dependencies,
/// the deduplicated values of all its transitive dependencies (leaves first)
/// and the node itself. Values are memoized by id: a node whose value was
/// computed through one parent is reused when reached through another.
pub fn topological_fold<N, V, F>(root: &Arc<N>, f: &mut F) -> V
where
  N: Node,
  V: Clone,
  F: FnMut(&[V], &[V], &Arc<N>) -> V,
{
  let mut memo: HashMap<String, V> = HashMap::new();
  fold_node(root, &mut memo, f)
}

fn fold_node<N, V, F>(node: &Arc<N>, memo: &mut HashMap<String, V>, f: &mut F) -> V
where
  N: Node,
  V: Clone,
  F: FnMut(&[V], &[V], &Arc<N>) -> V,
{
  if let Some(value) = memo.get(node.id()) {
    return value.clone();
  }

  let direct: Vec<V> = node.dependencies().iter().map(|dep| fold_node(dep, memo, f)).collect();

  // All memoized by now; gather the transitive set deduplicated by id.
  let all: Vec<V> = collect_transitive_dependencies(node)
    .iter()
    .filter_map(|dep| memo.get(dep.id()).cloned())
    .collect();

  let value = f(&direct, &all, node);
  memo.insert(node.id().to_string(), value.clone());
  value
}

/// A memo cell of the asynchronous fold: the computation itself, shareable.
pub type SharedFold<T> = Shared<BoxFuture<'static, T>>;

/// Build the suspended fold of the graph.
///
/// For each distinct id exactly one future is created; duplicated references
/// to the same node receive clones of the same [`SharedFold`] cell, so they
/// join the in-flight computation rather than re-running it. The machinery
/// never awaits; the reducer receives its direct dependencies' cells and
/// awaits them itself, which is what enforces dependency ordering.
///
/// Nothing runs until the returned future is polled.
pub fn topological_fold_async<N, T, F>(root: &Arc<N>, f: &F) -> SharedFold<T>
where
  N: Node,
  T: Clone,
  F: Fn(Vec<SharedFold<T>>, Arc<N>) -> BoxFuture<'static, T>,
{
  let mut memo: HashMap<String, SharedFold<T>> = HashMap::new();
  fold_cell(root, &mut memo, f)
}

fn fold_cell<N, T, F>(node: &Arc<N>, memo: &mut HashMap<String, SharedFold<T>>, f: &F) -> SharedFold<T>
where
  N: Node,
  T: Clone,
  F: Fn(Vec<SharedFold<T>>, Arc<N>) -> BoxFuture<'static, T>,
{
  if let Some(cell) = memo.get(node.id()) {
    return cell.clone();
  }

  let deps: Vec<SharedFold<T>> = node.dependencies().iter().map(|dep| fold_cell(dep, memo, f)).collect();

  let cell = f(deps, Arc::clone(node)).shared();
  memo.insert(node.id().to_string(), cell.clone());
  cell
}
