//! Environment composition engine.
//!
//! For every build this module computes the ordered set of environment
//! variables its commands run under. Composition has three layers:
//!
//! 1. A **built-in scope** per build: system variables describing the build's
//!    name, paths and dependencies, prefixed with `cur` for the build that is
//!    currently running and with the normalized package name when the build
//!    is seen as a dependency.
//! 2. **Exported variables** from manifests, substituted through a lexical
//!    evaluation scope (direct dependencies only; transitive globals are
//!    deliberately invisible at evaluation time) and classified into local
//!    and global scopes.
//! 3. The **task environment**: a fixed merge order in which later writes
//!    shadow earlier ones, finished by folding global scopes leaves-first and
//!    resolving seed back-references like `$PATH`.
//!
//! Conflict detection for exclusive bindings is an eject-time concern and
//! lives in [`EnvAccumulator`], an explicit accumulator value threaded
//! through the walk rather than process-global state.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::BuildConfig;
use crate::graph;
use crate::id::normalize_package_name;
use crate::sandbox::{BuildSandbox, BuildSpec, ExportScope};

static VAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([A-Za-z0-9_]+)").unwrap());

/// Substitute `$var` references through `lookup`.
///
/// An unresolved name passes through literally, so a value the scope cannot
/// satisfy is left for the shell. Substitution is a fixed point on values
/// without references.
pub fn substitute<F>(value: &str, lookup: F) -> String
where
  F: Fn(&str) -> Option<String>,
{
  VAR_RE
    .replace_all(value, |caps: &regex::Captures| {
      lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// The package a binding came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOwner {
  pub package: String,
  pub manifest_path: PathBuf,
}

impl BindingOwner {
  fn of(spec: &BuildSpec, config: &BuildConfig) -> Self {
    BindingOwner {
      package: spec.name.clone(),
      manifest_path: spec.manifest_path(&config.sandbox_path),
    }
  }
}

/// A fully-substituted environment binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBinding {
  pub name: String,
  pub value: String,
  pub exclusive: bool,
  pub builtin: bool,
  pub owner: BindingOwner,
}

/// An ordered scope of bindings.
pub type EnvScope = IndexMap<String, EnvBinding>;

/// The environment contribution of one build, computed once per id.
#[derive(Debug, Clone)]
pub struct SpecEnv {
  pub id: String,
  pub name: String,

  /// Built-in scope under the dependency prefix (`normalize(name)`),
  /// describing the build from a consumer's point of view.
  pub builtin: EnvScope,

  /// Evaluated local exports.
  pub local: EnvScope,

  /// Evaluated global exports.
  pub global: EnvScope,

  /// Finalized install sub-paths consumers splice into `PATH`/`MAN_PATH`
  /// and findlib configuration.
  pub bin_path: PathBuf,
  pub man_path: PathBuf,
  pub lib_path: PathBuf,
}

/// Build the built-in scope for a spec.
///
/// `prefix` is `cur` when describing the currently running build, the
/// normalized package name otherwise. All built-ins are exclusive.
pub fn builtin_scope(spec: &BuildSpec, config: &BuildConfig, prefix: &str, currently_building: bool) -> EnvScope {
  let owner = BindingOwner::of(spec, config);

  let root = if currently_building && spec.mutates_source_path {
    config.build_path(spec)
  } else {
    config.root_path(spec)
  };
  let install = if currently_building {
    config.install_path(spec)
  } else {
    config.final_install_path(spec)
  };
  let depends: Vec<&str> = spec.dependencies.iter().map(|dep| dep.name.as_str()).collect();

  let entries: Vec<(&str, String)> = vec![
    ("name", spec.name.clone()),
    ("version", spec.version.clone().unwrap_or_default()),
    ("root", root.display().to_string()),
    ("depends", depends.join(" ")),
    ("target_dir", config.build_path(spec).display().to_string()),
    ("install", install.display().to_string()),
    ("bin", install.join("bin").display().to_string()),
    ("sbin", install.join("sbin").display().to_string()),
    ("lib", install.join("lib").display().to_string()),
    ("man", install.join("man").display().to_string()),
    ("doc", install.join("doc").display().to_string()),
    ("stublibs", install.join("stublibs").display().to_string()),
    ("toplevel", install.join("toplevel").display().to_string()),
    ("share", install.join("share").display().to_string()),
    ("etc", install.join("etc").display().to_string()),
  ];

  entries
    .into_iter()
    .map(|(suffix, value)| {
      let name = format!("{}__{}", prefix, suffix);
      let binding = EnvBinding {
        name: name.clone(),
        value,
        exclusive: true,
        builtin: true,
        owner: owner.clone(),
      };
      (name, binding)
    })
    .collect()
}

/// Compute the [`SpecEnv`] of every build in the sandbox, leaves first.
///
/// Exported values substitute through the evaluation scope: the union of
/// each direct dependency's built-in scope, each direct dependency's local
/// exports, and the spec's own built-in scope under its non-`cur` prefix.
pub fn spec_environments(sandbox: &BuildSandbox, config: &BuildConfig) -> IndexMap<String, SpecEnv> {
  let mut envs: IndexMap<String, SpecEnv> = IndexMap::new();

  graph::topological_fold(&sandbox.root, &mut |direct: &[SpecEnv], _all: &[SpecEnv], spec: &Arc<BuildSpec>| {
    let env = compute_spec_env(spec, direct, config);
    envs.insert(spec.id.clone(), env.clone());
    env
  });

  envs
}

fn compute_spec_env(spec: &Arc<BuildSpec>, direct: &[SpecEnv], config: &BuildConfig) -> SpecEnv {
  let own_prefix = normalize_package_name(&spec.name);
  let builtin = builtin_scope(spec, config, &own_prefix, false);

  let mut eval_scope: IndexMap<String, String> = IndexMap::new();
  for dep in direct {
    for binding in dep.builtin.values() {
      eval_scope.insert(binding.name.clone(), binding.value.clone());
    }
    for binding in dep.local.values() {
      eval_scope.insert(binding.name.clone(), binding.value.clone());
    }
  }
  for binding in builtin.values() {
    eval_scope.insert(binding.name.clone(), binding.value.clone());
  }

  let owner = BindingOwner::of(spec, config);
  let mut local = EnvScope::new();
  let mut global = EnvScope::new();

  for (name, descriptor) in &spec.exported_env {
    let value = substitute(&descriptor.value, |n| eval_scope.get(n).cloned());
    let binding = EnvBinding {
      name: name.clone(),
      value,
      exclusive: descriptor.exclusive,
      builtin: false,
      owner: owner.clone(),
    };
    match descriptor.scope {
      ExportScope::Global => global.insert(name.clone(), binding),
      ExportScope::Local => local.insert(name.clone(), binding),
    };
  }

  let final_install = config.final_install_path(spec);

  SpecEnv {
    id: spec.id.clone(),
    name: spec.name.clone(),
    builtin,
    local,
    global,
    bin_path: final_install.join("bin"),
    man_path: final_install.join("man"),
    lib_path: final_install.join("lib"),
  }
}

/// Assemble the environment a build's commands run under.
///
/// Merge order matters; later writes shadow earlier ones:
///
/// 1. findlib configuration pointer
/// 2. `PATH`/`MAN_PATH` spliced from all transitive dependencies
/// 3. the build's own built-in scope under `cur`
/// 4. each direct dependency's local scope, in order
/// 5. the build's own local scope
/// 6. the leaves-first fold of transitive global scopes plus its own,
///    re-substituting each value against the accumulator as it stands so a
///    downstream shadow can refer back to the value it shadows
/// 7. the sandbox's seeded environment, resolving back-references like
///    `$PATH` and appending seeds not otherwise set
pub fn assemble_task_env(
  own: &SpecEnv,
  spec: &BuildSpec,
  direct: &[&SpecEnv],
  transitive: &[&SpecEnv],
  config: &BuildConfig,
  initial_env: &[(String, String)],
) -> IndexMap<String, String> {
  let mut acc: IndexMap<String, String> = IndexMap::new();

  // 1. findlib configuration for the build that is about to run.
  let findlib_conf = config.build_path(spec).join("_esy").join("findlib.conf");
  acc.insert("OCAMLFIND_CONF".to_string(), findlib_conf.display().to_string());

  // 2. Search paths across the transitive dependency set.
  let mut bin_parts: Vec<String> = transitive.iter().map(|dep| dep.bin_path.display().to_string()).collect();
  bin_parts.push("$PATH".to_string());
  acc.insert("PATH".to_string(), bin_parts.join(":"));

  let mut man_parts: Vec<String> = transitive.iter().map(|dep| dep.man_path.display().to_string()).collect();
  man_parts.push("$MAN_PATH".to_string());
  acc.insert("MAN_PATH".to_string(), man_parts.join(":"));

  // 3. Own built-ins under the `cur` prefix.
  for binding in builtin_scope(spec, config, "cur", true).values() {
    acc.insert(binding.name.clone(), binding.value.clone());
  }

  // 4. Direct dependencies' local scopes.
  for dep in direct {
    for binding in dep.local.values() {
      acc.insert(binding.name.clone(), binding.value.clone());
    }
  }

  // 5. Own local scope.
  for binding in own.local.values() {
    acc.insert(binding.name.clone(), binding.value.clone());
  }

  // 6. Global scopes, leaves first, then our own. Each value re-substitutes
  // against the accumulator so `X = "$X:more"` extends the shadowed X.
  for scope in transitive.iter().map(|dep| &dep.global).chain(std::iter::once(&own.global)) {
    for binding in scope.values() {
      let value = substitute(&binding.value, |n| acc.get(n).cloned());
      acc.insert(binding.name.clone(), value);
    }
  }

  // 7. Seeded environment. Seed values may reference composed variables;
  // composed values may reference seeds (`$PATH`). Resolve both directions,
  // then append seeds that nothing shadowed.
  let resolved_seeds: Vec<(String, String)> = initial_env
    .iter()
    .map(|(name, value)| (name.clone(), substitute(value, |n| acc.get(n).cloned())))
    .collect();

  let seed_lookup = |name: &str| {
    resolved_seeds
      .iter()
      .find(|(seed, _)| seed == name)
      .map(|(_, value)| value.clone())
  };
  for value in acc.values_mut() {
    let substituted = substitute(value, &seed_lookup);
    *value = substituted;
  }

  for (name, value) in resolved_seeds {
    if !acc.contains_key(&name) {
      acc.insert(name, value);
    }
  }

  acc
}

/// Tracks every variable ever set while flattening environment groups, and
/// the package that set it. Produces the exclusivity diagnostics surfaced in
/// the ejected environment.
#[derive(Debug, Default)]
pub struct EnvAccumulator {
  bindings: EnvScope,
  pub diagnostics: Vec<String>,
}

impl EnvAccumulator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a binding, recording conflicts against the incumbent.
  ///
  /// Both phases fire independently: an exclusive incumbent rejects any
  /// override, and an exclusive challenger rejects any incumbent. When both
  /// are exclusive, two distinct diagnostics are emitted.
  pub fn insert(&mut self, binding: EnvBinding) {
    if let Some(prev) = self.bindings.get(&binding.name) {
      if prev.exclusive {
        let kind = if prev.builtin { "built-in variable" } else { "variable" };
        self.diagnostics.push(format!(
          "{} {} is declared exclusive by {} ({}) and cannot be overridden by {} ({})",
          kind,
          binding.name,
          prev.owner.package,
          prev.owner.manifest_path.display(),
          binding.owner.package,
          binding.owner.manifest_path.display(),
        ));
      }
      if binding.exclusive {
        let kind = if binding.builtin { "built-in variable" } else { "variable" };
        self.diagnostics.push(format!(
          "{} {} is declared exclusive by {} ({}) but is already set by {} ({})",
          kind,
          binding.name,
          binding.owner.package,
          binding.owner.manifest_path.display(),
          prev.owner.package,
          prev.owner.manifest_path.display(),
        ));
      }
    }

    self.bindings.insert(binding.name.clone(), binding);
  }

  pub fn bindings(&self) -> &EnvScope {
    &self.bindings
  }
}

/// Naming lints for user-authored exports.
///
/// Local variables are expected to carry the package's normalized prefix;
/// globals that look namespaced but carry someone else's prefix are likely
/// clobbering another package.
pub fn lint_exported_env(spec: &BuildSpec) -> Vec<String> {
  let prefix = normalize_package_name(&spec.name);
  let mut warnings = Vec::new();

  for (name, descriptor) in &spec.exported_env {
    match descriptor.scope {
      ExportScope::Local => {
        if !name.starts_with(&prefix) {
          if name.to_lowercase().starts_with(&prefix) {
            warnings.push(format!(
              "{} exports {} with incorrect case; expected a name starting with {}",
              spec.name, name, prefix
            ));
          } else {
            warnings.push(format!(
              "{} exports {} without the package prefix {}",
              spec.name, name, prefix
            ));
          }
        }
      }
      ExportScope::Global => {
        if name.contains("__") && !name.starts_with(&prefix) {
          warnings.push(format!(
            "{} exports global {} which looks namespaced but does not start with {}; it may clobber another package's namespace",
            spec.name, name, prefix
          ));
        }
      }
    }
  }

  warnings
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sandbox::ExportDescriptor;
  use indexmap::IndexMap;
  use std::path::PathBuf;

  fn config() -> BuildConfig {
    BuildConfig::new(
      PathBuf::from("/store"),
      PathBuf::from("/local"),
      PathBuf::from("/sandbox"),
    )
  }

  fn spec_with(
    name: &str,
    exported: Vec<(&str, &str, ExportScope, bool)>,
    dependencies: Vec<Arc<BuildSpec>>,
  ) -> Arc<BuildSpec> {
    let exported_env: IndexMap<String, ExportDescriptor> = exported
      .into_iter()
      .map(|(var, value, scope, exclusive)| {
        (
          var.to_string(),
          ExportDescriptor {
            value: value.to_string(),
            scope,
            exclusive,
            builtin: false,
          },
        )
      })
      .collect();

    Arc::new(BuildSpec {
      id: format!("{}-1.0.0-0000", name),
      name: name.to_string(),
      version: Some("1.0.0".to_string()),
      command: None,
      exported_env,
      source_path: PathBuf::from("node_modules").join(name),
      mutates_source_path: false,
      // Roots are development builds; everything else acts installed.
      should_be_persisted: name != "root",
      dependencies,
      errors: Vec::new(),
    })
  }

  fn sandbox_around(root: Arc<BuildSpec>) -> BuildSandbox {
    BuildSandbox {
      root,
      initial_env: vec![
        ("PATH".to_string(), "/usr/bin:/bin".to_string()),
        ("SHELL".to_string(), "/bin/sh".to_string()),
      ],
    }
  }

  #[test]
  fn builtin_scope_covers_the_full_variable_set() {
    let spec = spec_with("pkg", vec![], vec![]);
    let scope = builtin_scope(&spec, &config(), "cur", true);

    let names: Vec<&String> = scope.keys().collect();
    assert_eq!(
      names,
      vec![
        "cur__name",
        "cur__version",
        "cur__root",
        "cur__depends",
        "cur__target_dir",
        "cur__install",
        "cur__bin",
        "cur__sbin",
        "cur__lib",
        "cur__man",
        "cur__doc",
        "cur__stublibs",
        "cur__toplevel",
        "cur__share",
        "cur__etc",
      ]
    );
    assert!(scope.values().all(|b| b.exclusive && b.builtin));
  }

  #[test]
  fn builtin_install_switches_with_build_phase() {
    let spec = spec_with("pkg", vec![], vec![]);
    let cfg = config();

    let building = builtin_scope(&spec, &cfg, "cur", true);
    assert_eq!(building["cur__install"].value, "/store/_insttmp/pkg-1.0.0-0000");
    assert_eq!(building["cur__bin"].value, "/store/_insttmp/pkg-1.0.0-0000/bin");

    let consumed = builtin_scope(&spec, &cfg, "pkg", false);
    assert_eq!(consumed["pkg__install"].value, "/store/_install/pkg-1.0.0-0000");
  }

  #[test]
  fn builtin_depends_joins_dependency_names() {
    let a = spec_with("a", vec![], vec![]);
    let b = spec_with("b", vec![], vec![]);
    let root = spec_with("root", vec![], vec![a, b]);

    let scope = builtin_scope(&root, &config(), "cur", true);
    assert_eq!(scope["cur__depends"].value, "a b");
  }

  #[test]
  fn exports_substitute_through_dependency_locals() {
    // dep exports dep__v = "x"; root exports consumer = "$dep__v".
    let dep = spec_with("dep", vec![("dep__v", "x", ExportScope::Local, false)], vec![]);
    let root = spec_with("root", vec![("root__consumer", "$dep__v", ExportScope::Local, false)], vec![dep]);
    let sandbox = sandbox_around(root);

    let envs = spec_environments(&sandbox, &config());
    let root_env = &envs[&sandbox.root.id];

    assert_eq!(root_env.local["root__consumer"].value, "x");
  }

  #[test]
  fn exports_substitute_through_dependency_builtins() {
    let dep = spec_with("dep", vec![], vec![]);
    let root = spec_with(
      "root",
      vec![("root__libdir", "$dep__lib", ExportScope::Local, false)],
      vec![dep],
    );
    let sandbox = sandbox_around(root);

    let envs = spec_environments(&sandbox, &config());
    let root_env = &envs[&sandbox.root.id];

    assert_eq!(
      root_env.local["root__libdir"].value,
      "/store/_install/dep-1.0.0-0000/lib"
    );
  }

  #[test]
  fn transitive_globals_are_not_in_the_evaluation_scope() {
    // grandchild exports a global; the root's exports cannot see it at
    // evaluation time even though it lands in the final task env.
    let grandchild = spec_with("gc", vec![("GC_GLOBAL", "deep", ExportScope::Global, false)], vec![]);
    let child = spec_with("child", vec![], vec![grandchild]);
    let root = spec_with("root", vec![("root__x", "$GC_GLOBAL", ExportScope::Local, false)], vec![child]);
    let sandbox = sandbox_around(root);

    let envs = spec_environments(&sandbox, &config());
    let root_env = &envs[&sandbox.root.id];

    assert_eq!(root_env.local["root__x"].value, "$GC_GLOBAL");
  }

  #[test]
  fn unresolved_reference_passes_through() {
    assert_eq!(substitute("$nope/bin", |_| None), "$nope/bin");
    assert_eq!(substitute("no references", |_| None), "no references");
  }

  fn task_env_for(sandbox: &BuildSandbox, cfg: &BuildConfig) -> IndexMap<String, String> {
    let envs = spec_environments(sandbox, cfg);
    let own = &envs[&sandbox.root.id];
    let direct: Vec<&SpecEnv> = sandbox.root.dependencies.iter().map(|d| &envs[&d.id]).collect();
    let transitive_specs = graph::collect_transitive_dependencies(&sandbox.root);
    let transitive: Vec<&SpecEnv> = transitive_specs.iter().map(|d| &envs[&d.id]).collect();
    assemble_task_env(own, &sandbox.root, &direct, &transitive, cfg, &sandbox.initial_env)
  }

  #[test]
  fn task_env_splices_dependency_bins_into_path() {
    let dep = spec_with("dep", vec![], vec![]);
    let root = spec_with("root", vec![], vec![dep]);
    let sandbox = sandbox_around(root);

    let env = task_env_for(&sandbox, &config());

    // The $PATH back-reference resolved against the seeded host PATH.
    assert_eq!(env["PATH"], "/store/_install/dep-1.0.0-0000/bin:/usr/bin:/bin");
    assert_eq!(env["MAN_PATH"], "/store/_install/dep-1.0.0-0000/man:$MAN_PATH");
  }

  #[test]
  fn task_env_contains_cur_builtins_and_dep_locals() {
    let dep = spec_with("dep", vec![("dep__v", "x", ExportScope::Local, false)], vec![]);
    let root = spec_with("root", vec![], vec![dep]);
    let sandbox = sandbox_around(root);

    let env = task_env_for(&sandbox, &config());

    assert_eq!(env["cur__name"], "root");
    assert_eq!(env["cur__install"], "/local/_insttmp/root-1.0.0-0000");
    assert_eq!(env["dep__v"], "x");
    assert_eq!(env["SHELL"], "/bin/sh");
  }

  #[test]
  fn global_fold_lets_downstream_extend_shadowed_value() {
    // Leaf sets FLAGS; the mid package shadows it while referring back.
    let leaf = spec_with("leaf", vec![("FLAGS", "-a", ExportScope::Global, false)], vec![]);
    let mid = spec_with("mid", vec![("FLAGS", "$FLAGS -b", ExportScope::Global, false)], vec![leaf]);
    let root = spec_with("root", vec![], vec![mid]);
    let sandbox = sandbox_around(root);

    let env = task_env_for(&sandbox, &config());

    assert_eq!(env["FLAGS"], "-a -b");
  }

  #[test]
  fn accumulator_reports_both_exclusive_phases() {
    let cfg = config();
    let a = spec_with("a", vec![], vec![]);
    let b = spec_with("b", vec![], vec![]);

    let mut acc = EnvAccumulator::new();
    acc.insert(EnvBinding {
      name: "CONFLICT".to_string(),
      value: "1".to_string(),
      exclusive: true,
      builtin: false,
      owner: BindingOwner::of(&a, &cfg),
    });
    acc.insert(EnvBinding {
      name: "CONFLICT".to_string(),
      value: "2".to_string(),
      exclusive: true,
      builtin: false,
      owner: BindingOwner::of(&b, &cfg),
    });

    // One diagnostic per phase: incumbent-exclusive and challenger-exclusive.
    assert_eq!(acc.diagnostics.len(), 2);
    assert!(acc.diagnostics[0].contains("cannot be overridden"));
    assert!(acc.diagnostics[1].contains("already set"));
    for diagnostic in &acc.diagnostics {
      assert!(diagnostic.contains("node_modules/a/package.json"));
      assert!(diagnostic.contains("node_modules/b/package.json"));
    }
  }

  #[test]
  fn accumulator_distinguishes_builtin_collisions() {
    let cfg = config();
    let a = spec_with("a", vec![], vec![]);
    let b = spec_with("b", vec![], vec![]);

    let mut acc = EnvAccumulator::new();
    acc.insert(EnvBinding {
      name: "a__install".to_string(),
      value: "/somewhere".to_string(),
      exclusive: true,
      builtin: true,
      owner: BindingOwner::of(&a, &cfg),
    });
    acc.insert(EnvBinding {
      name: "a__install".to_string(),
      value: "/elsewhere".to_string(),
      exclusive: false,
      builtin: false,
      owner: BindingOwner::of(&b, &cfg),
    });

    assert_eq!(acc.diagnostics.len(), 1);
    assert!(acc.diagnostics[0].starts_with("built-in variable"));
  }

  #[test]
  fn non_exclusive_shadowing_is_silent() {
    let cfg = config();
    let a = spec_with("a", vec![], vec![]);
    let b = spec_with("b", vec![], vec![]);

    let mut acc = EnvAccumulator::new();
    for spec in [&a, &b] {
      acc.insert(EnvBinding {
        name: "SHARED".to_string(),
        value: spec.name.clone(),
        exclusive: false,
        builtin: false,
        owner: BindingOwner::of(spec, &cfg),
      });
    }

    assert!(acc.diagnostics.is_empty());
    assert_eq!(acc.bindings()["SHARED"].value, "b");
  }

  #[test]
  fn lints_flag_unprefixed_and_miscased_locals() {
    let spec = spec_with(
      "my-pkg",
      vec![
        ("my_pkg__ok", "1", ExportScope::Local, false),
        ("OTHER__var", "1", ExportScope::Local, false),
        ("My_Pkg__bad_case", "1", ExportScope::Local, false),
      ],
      vec![],
    );

    let warnings = lint_exported_env(&spec);
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains("without the package prefix"));
    assert!(warnings[1].contains("incorrect case"));
  }

  #[test]
  fn lints_flag_namespaced_globals_with_foreign_prefix() {
    let spec = spec_with(
      "pkg",
      vec![
        ("CAML_LD_LIBRARY_PATH", "x", ExportScope::Global, false),
        ("other__var", "x", ExportScope::Global, false),
      ],
      vec![],
    );

    let warnings = lint_exported_env(&spec);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("other__var"));
    assert!(warnings[0].contains("clobber"));
  }
}
