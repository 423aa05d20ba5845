//! The build graph and the sandbox crawler.
//!
//! A sandbox is a directory tree rooted at a `package.json` whose transitive
//! dependencies, under the standard nested resolution rule, form the build
//! graph. Crawling produces an immutable [`BuildSpec`] graph with stable
//! identifiers; everything downstream (planning, environment composition,
//! the driver) works from that graph and never re-reads manifests.
//!
//! Crawl-phase problems (cycles, unresolved names, missing dependency
//! manifests) are recorded as diagnostics on the affected spec and never
//! abort the walk, so a single crawl surfaces the complete error set. Only a
//! missing manifest at the sandbox root is fatal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, error};

use crate::graph::Node;
use crate::id;
use crate::manifest::{EsyConfig, ManifestError, PackageManifest};
use crate::platform;

/// Where an exported variable is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
  /// Visible to direct dependents only (the default).
  Local,
  /// Folded into the environment of every transitive dependent.
  Global,
}

/// A single variable exported by a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescriptor {
  /// The pre-substitution value.
  pub value: String,

  pub scope: ExportScope,

  /// The declarer insists on being the sole producer of this name.
  pub exclusive: bool,

  /// True only for auto-generated system variables; user-authored
  /// descriptors never set this.
  pub builtin: bool,
}

/// One build in the graph. Immutable after crawl.
#[derive(Debug)]
pub struct BuildSpec {
  /// Stable identifier; unique within a run and a valid path component.
  pub id: String,

  pub name: String,

  pub version: Option<String>,

  /// Build commands; `None` means the package has nothing to run but still
  /// gets an install tree.
  pub command: Option<Vec<String>>,

  /// Exported environment in manifest order.
  pub exported_env: IndexMap<String, ExportDescriptor>,

  /// Package directory relative to the sandbox root.
  pub source_path: PathBuf,

  /// The build writes into its own source tree and must run from a staged
  /// copy.
  pub mutates_source_path: bool,

  /// Whether artifacts belong in the shared store (immutable source) or the
  /// sandbox-local store (development source).
  pub should_be_persisted: bool,

  /// Direct dependencies in declaration order. The graph is a DAG; shared
  /// subgraphs are shared `Arc`s, not copies.
  pub dependencies: Vec<Arc<BuildSpec>>,

  /// Diagnostics gathered while crawling this package.
  pub errors: Vec<String>,
}

impl Node for BuildSpec {
  fn id(&self) -> &str {
    &self.id
  }

  fn dependencies(&self) -> &[Arc<Self>] {
    &self.dependencies
  }
}

impl BuildSpec {
  /// Manifest location for this spec, for diagnostics.
  pub fn manifest_path(&self, sandbox_path: &Path) -> PathBuf {
    sandbox_path.join(&self.source_path).join("package.json")
  }
}

/// A crawled sandbox: the root build plus the seeded host environment.
#[derive(Debug)]
pub struct BuildSandbox {
  pub root: Arc<BuildSpec>,
  pub initial_env: Vec<(String, String)>,
}

/// Errors that abort a crawl.
///
/// Per-package problems are diagnostics on the spec, not errors here.
#[derive(Debug, Error)]
pub enum CrawlError {
  /// The sandbox root has no manifest.
  #[error("no package.json found in sandbox at {0}")]
  SandboxManifestMissing(PathBuf),

  /// A resolved dependency location has no manifest. Internal: callers see
  /// this as a diagnostic on the dependent spec.
  #[error("missing manifest at {0}")]
  DependencyManifestMissing(PathBuf),

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

/// External collaborator: maps a dependency name, relative to a package
/// directory, to the path of that dependency's manifest.
pub trait ManifestResolver {
  fn resolve(&self, base_dir: &Path, name: &str) -> Option<PathBuf>;
}

/// The standard nested resolution rule: look for
/// `<dir>/node_modules/<name>/package.json` in the package directory and
/// each of its ancestors.
pub struct NodeModulesResolver;

impl ManifestResolver for NodeModulesResolver {
  fn resolve(&self, base_dir: &Path, name: &str) -> Option<PathBuf> {
    for dir in base_dir.ancestors() {
      let candidate = dir.join("node_modules").join(name).join("package.json");
      if candidate.is_file() {
        return Some(candidate);
      }
    }
    None
  }
}

impl BuildSandbox {
  /// Crawl the sandbox rooted at `path` with the standard resolver.
  pub fn from_directory(path: &Path) -> Result<Self, CrawlError> {
    Self::from_directory_with(path, &NodeModulesResolver)
  }

  /// Crawl the sandbox rooted at `path` with a caller-provided resolver.
  pub fn from_directory_with<R: ManifestResolver>(path: &Path, resolver: &R) -> Result<Self, CrawlError> {
    let initial_env = platform::initial_environment();
    let mut crawler = Crawler::new(path, resolver, initial_env.clone());
    let root = match crawler.crawl_package(path, &mut Vec::new(), true) {
      Ok(root) => root,
      Err(e) => {
        error!(sandbox = %path.display(), error = %e, "crawl failed");
        return Err(e);
      }
    };

    Ok(BuildSandbox { root, initial_env })
  }

  /// All crawl diagnostics in the graph, paired with the package they were
  /// recorded on.
  pub fn crawl_errors(&self) -> Vec<(String, String)> {
    let mut errors = Vec::new();
    crate::graph::traverse_breadth_first(&self.root, |spec| {
      for message in &spec.errors {
        errors.push((spec.name.clone(), message.clone()));
      }
    });
    errors
  }
}

struct Crawler<'r, R: ManifestResolver> {
  sandbox_path: PathBuf,
  resolver: &'r R,
  initial_env: Vec<(String, String)>,

  /// Module resolution results, keyed by `(baseDir, name)`.
  resolution_cache: HashMap<(PathBuf, String), Option<PathBuf>>,

  /// Crawled specs keyed by the resolved manifest path: a package reached
  /// through several parents is crawled exactly once.
  spec_cache: HashMap<PathBuf, Arc<BuildSpec>>,
}

impl<'r, R: ManifestResolver> Crawler<'r, R> {
  fn new(sandbox_path: &Path, resolver: &'r R, initial_env: Vec<(String, String)>) -> Self {
    let sandbox_path = std::fs::canonicalize(sandbox_path).unwrap_or_else(|_| sandbox_path.to_path_buf());
    Crawler {
      sandbox_path,
      resolver,
      initial_env,
      resolution_cache: HashMap::new(),
      spec_cache: HashMap::new(),
    }
  }

  fn crawl_package(&mut self, dir: &Path, trace: &mut Vec<String>, is_root: bool) -> Result<Arc<BuildSpec>, CrawlError> {
    let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    let manifest_path = dir.join("package.json");

    if let Some(cached) = self.spec_cache.get(&manifest_path) {
      return Ok(Arc::clone(cached));
    }

    let manifest = match PackageManifest::read(&manifest_path) {
      Ok(manifest) => manifest,
      Err(ManifestError::NotFound(path)) => {
        if is_root {
          return Err(CrawlError::SandboxManifestMissing(dir));
        }
        return Err(CrawlError::DependencyManifestMissing(path));
      }
      Err(e) => return Err(e.into()),
    };

    debug!(package = %manifest.name, dir = %dir.display(), "crawling package");

    let esy = manifest.esy.clone().unwrap_or_else(EsyConfig::default);
    let command = esy.build.as_ref().map(|build| build.to_commands());
    let exported_env: IndexMap<String, ExportDescriptor> = esy
      .exported_env
      .iter()
      .map(|(name, entry)| {
        let scope = match entry.scope.as_deref() {
          Some("global") => ExportScope::Global,
          _ => ExportScope::Local,
        };
        let descriptor = ExportDescriptor {
          value: entry.val.clone().unwrap_or_default(),
          scope,
          exclusive: entry.exclusive,
          builtin: false,
        };
        (name.clone(), descriptor)
      })
      .collect();

    let mut dependencies = Vec::new();
    let mut errors = Vec::new();
    let mut unresolved = Vec::new();

    trace.push(manifest.name.clone());

    for (dep_name, _version_spec) in manifest.declared_dependencies() {
      if trace.contains(&dep_name) {
        let mut cycle: Vec<&str> = trace.iter().map(String::as_str).collect();
        cycle.push(&dep_name);
        errors.push(format!("circular dependency detected: {}", cycle.join(" -> ")));
        continue;
      }

      let key = (dir.clone(), dep_name.clone());
      let resolved = if let Some(hit) = self.resolution_cache.get(&key) {
        hit.clone()
      } else {
        let result = self.resolver.resolve(&dir, &dep_name);
        self.resolution_cache.insert(key, result.clone());
        result
      };

      let Some(dep_manifest_path) = resolved else {
        unresolved.push(dep_name);
        continue;
      };

      let dep_dir = dep_manifest_path.parent().unwrap_or(&dir).to_path_buf();
      match self.crawl_package(&dep_dir, trace, false) {
        Ok(dep) => dependencies.push(dep),
        Err(CrawlError::DependencyManifestMissing(path)) => {
          errors.push(format!("missing manifest at {}", path.display()));
        }
        Err(fatal) => {
          trace.pop();
          return Err(fatal);
        }
      }
    }

    trace.pop();

    if !unresolved.is_empty() {
      let shown: Vec<&str> = unresolved.iter().take(3).map(String::as_str).collect();
      let message = if unresolved.len() > 3 {
        format!(
          "unable to resolve dependencies: {} (and {} more)",
          shown.join(", "),
          unresolved.len() - 3
        )
      } else {
        format!("unable to resolve dependencies: {}", shown.join(", "))
      };
      errors.push(message);
    }

    let source = match &manifest.resolved {
      Some(url) => url.clone(),
      None => format!("local:{}", dir.display()),
    };
    let dependency_ids: Vec<String> = dependencies.iter().map(|dep| dep.id.clone()).collect();
    let spec_id = id::build_spec_id(&manifest, &self.initial_env, &source, &dependency_ids);

    let source_path = dir
      .strip_prefix(&self.sandbox_path)
      .map(Path::to_path_buf)
      .unwrap_or_else(|_| dir.clone());

    let spec = Arc::new(BuildSpec {
      id: spec_id,
      name: manifest.name.clone(),
      version: manifest.version.clone(),
      command,
      exported_env,
      source_path,
      mutates_source_path: esy.builds_in_source,
      should_be_persisted: !is_root && manifest.resolved.is_some(),
      dependencies,
      errors,
    });

    self.spec_cache.insert(manifest_path, Arc::clone(&spec));
    Ok(spec)
  }
}
