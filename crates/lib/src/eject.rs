//! Ejected environment dump.
//!
//! Produces a portable, human-readable rendition of the root build's
//! environment: groups of `export NAME="value"` lines, one group per
//! package, intended to be sourced by a POSIX shell outside the
//! orchestrator. Flattening the groups is where exclusivity conflicts and
//! naming lints surface: the composition tracks every variable ever set
//! and the package that set it.

use tracing::debug;

use crate::config::BuildConfig;
use crate::env::{self, BindingOwner, EnvAccumulator, EnvBinding};
use crate::graph;
use crate::sandbox::{BuildSandbox, BuildSpec};

/// Host end-of-line sequence used between rendered lines.
#[cfg(windows)]
pub const EOL: &str = "\r\n";

/// Host end-of-line sequence used between rendered lines.
#[cfg(not(windows))]
pub const EOL: &str = "\n";

/// One named group of exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvGroup {
  pub header: String,
  pub exports: Vec<(String, String)>,
}

/// The flattened environment plus everything composition complained about.
#[derive(Debug)]
pub struct EjectedEnv {
  pub groups: Vec<EnvGroup>,

  /// Exclusivity conflicts and naming lints, in composition order.
  pub diagnostics: Vec<String>,
}

/// Compose the grouped environment dump for the sandbox root.
///
/// Groups come out in composition order: the seeded sandbox environment,
/// every dependency leaves-first, then the root under its `cur` prefix.
pub fn eject_root_environment(sandbox: &BuildSandbox, config: &BuildConfig) -> EjectedEnv {
  let envs = env::spec_environments(sandbox, config);
  let mut accumulator = EnvAccumulator::new();
  let mut groups = Vec::new();
  let mut diagnostics = Vec::new();

  let sandbox_owner = BindingOwner {
    package: "sandbox".to_string(),
    manifest_path: config.sandbox_path.join("package.json"),
  };
  for (name, value) in &sandbox.initial_env {
    accumulator.insert(EnvBinding {
      name: name.clone(),
      value: value.clone(),
      exclusive: false,
      builtin: true,
      owner: sandbox_owner.clone(),
    });
  }
  groups.push(EnvGroup {
    header: "sandbox environment".to_string(),
    exports: sandbox.initial_env.clone(),
  });

  for spec in graph::collect_transitive_dependencies(&sandbox.root) {
    diagnostics.extend(env::lint_exported_env(&spec));
    groups.push(package_group(&spec, &envs[&spec.id], None, &mut accumulator));
  }

  diagnostics.extend(env::lint_exported_env(&sandbox.root));
  let root_builtin = env::builtin_scope(&sandbox.root, config, "cur", true);
  groups.push(package_group(
    &sandbox.root,
    &envs[&sandbox.root.id],
    Some(&root_builtin),
    &mut accumulator,
  ));

  diagnostics.extend(accumulator.diagnostics);

  debug!(groups = groups.len(), diagnostics = diagnostics.len(), "environment ejected");

  EjectedEnv { groups, diagnostics }
}

fn package_group(
  spec: &BuildSpec,
  spec_env: &env::SpecEnv,
  builtin_override: Option<&env::EnvScope>,
  accumulator: &mut EnvAccumulator,
) -> EnvGroup {
  let builtin = builtin_override.unwrap_or(&spec_env.builtin);
  let mut exports = Vec::new();

  for binding in builtin
    .values()
    .chain(spec_env.local.values())
    .chain(spec_env.global.values())
  {
    accumulator.insert(binding.clone());
    exports.push((binding.name.clone(), binding.value.clone()));
  }

  let header = match &spec.version {
    Some(version) => format!("{}@{}", spec.name, version),
    None => spec.name.clone(),
  };

  EnvGroup { header, exports }
}

/// Render the dump into sourceable shell text.
pub fn render(ejected: &EjectedEnv) -> String {
  let mut sections = Vec::new();

  for group in &ejected.groups {
    let mut lines = vec![format!("# {}", group.header)];
    for (name, value) in &group.exports {
      lines.push(format!("export {}=\"{}\"", name, escape_value(value)));
    }
    sections.push(lines.join(EOL));
  }

  let mut out = sections.join(&format!("{}{}", EOL, EOL));
  out.push_str(EOL);
  out
}

/// Recover the name/value pairs from a rendered dump.
///
/// Also understands the `_esy/env` file flavor with trailing semicolons.
/// Later bindings of the same name shadow earlier ones when the result is
/// collected into a map, matching how a shell would source the text.
pub fn parse(dump: &str) -> Vec<(String, String)> {
  let mut pairs = Vec::new();

  for line in dump.lines() {
    let line = line.trim();
    let Some(rest) = line.strip_prefix("export ") else {
      continue;
    };
    let Some((name, value)) = rest.split_once('=') else {
      continue;
    };

    let value = value.trim().trim_end_matches(';');
    let value = value
      .strip_prefix('"')
      .and_then(|v| v.strip_suffix('"'))
      .map(unescape_value)
      .unwrap_or_else(|| value.to_string());

    pairs.push((name.trim().to_string(), value));
  }

  pairs
}

/// Escape a value for a double-quoted export line.
pub fn escape_value(value: &str) -> String {
  value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unescape_value(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  let mut chars = value.chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      match chars.next() {
        Some(escaped) => out.push(escaped),
        None => out.push('\\'),
      }
    } else {
      out.push(c);
    }
  }
  out
}
