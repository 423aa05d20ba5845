//! Package manifest model.
//!
//! The crate reads plain `package.json` files; the build-relevant extension
//! lives under the `esy` key. Mapping fields deserialize into [`IndexMap`] so
//! the manifest's textual order survives the parse: exported-environment
//! iteration order is part of the environment-composition contract.

use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  /// The manifest file does not exist.
  #[error("no manifest found at {0}")]
  NotFound(PathBuf),

  /// Reading the manifest failed for a reason other than absence.
  #[error("failed to read manifest at {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The manifest is not valid JSON or has an unexpected shape.
  #[error("failed to parse manifest at {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// A parsed `package.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PackageManifest {
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,

  /// Runtime dependencies, in manifest order.
  #[serde(default)]
  pub dependencies: IndexMap<String, String>,

  /// Peer dependencies, in manifest order.
  #[serde(default, rename = "peerDependencies")]
  pub peer_dependencies: IndexMap<String, String>,

  /// The build-metadata extension block.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub esy: Option<EsyConfig>,

  /// Set by the installer when the package came from an immutable source.
  /// Its presence is what makes a non-root build persisted.
  #[serde(default, rename = "_resolved", skip_serializing_if = "Option::is_none")]
  pub resolved: Option<String>,
}

impl PackageManifest {
  /// Read and parse a manifest from disk.
  ///
  /// Absence is reported as [`ManifestError::NotFound`] so callers can treat
  /// a missing dependency manifest as a diagnostic rather than a failure.
  pub fn read(path: &Path) -> Result<Self, ManifestError> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ManifestError::NotFound(path.to_path_buf())),
      Err(e) => {
        return Err(ManifestError::Read {
          path: path.to_path_buf(),
          source: e,
        })
      }
    };

    serde_json::from_str(&content).map_err(|e| ManifestError::Parse {
      path: path.to_path_buf(),
      source: e,
    })
  }

  /// The declared dependency set: the order-preserved union of runtime and
  /// peer dependencies, deduplicated by `name@versionSpec`. Development and
  /// optional dependencies never enter the build graph.
  pub fn declared_dependencies(&self) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut deps = Vec::new();

    for (name, spec) in self.dependencies.iter().chain(self.peer_dependencies.iter()) {
      let key = format!("{}@{}", name, spec);
      if seen.insert(key) {
        deps.push((name.clone(), spec.clone()));
      }
    }

    deps
  }
}

/// The recognized `esy` manifest block.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EsyConfig {
  /// Build commands; a single string promotes to a one-element sequence.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<CommandList>,

  /// Whether the build mutates its own source tree. Such builds run from a
  /// copy staged under the store's build tree.
  #[serde(default, rename = "buildsInSource")]
  pub builds_in_source: bool,

  /// Environment exported to consumers, in manifest order.
  #[serde(default, rename = "exportedEnv")]
  pub exported_env: IndexMap<String, ExportedEnv>,
}

/// Build commands as they appear in the manifest.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandList {
  Single(String),
  Many(Vec<String>),
}

impl CommandList {
  /// Normalize to an ordered command sequence.
  pub fn to_commands(&self) -> Vec<String> {
    match self {
      CommandList::Single(cmd) => vec![cmd.clone()],
      CommandList::Many(cmds) => cmds.clone(),
    }
  }
}

/// A single exported-environment entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExportedEnv {
  /// The pre-substitution value. A JSON `null` means the empty string.
  #[serde(default)]
  pub val: Option<String>,

  /// `"global"` or absent (local).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scope: Option<String>,

  /// Whether the declarer insists on being the sole producer of the name.
  #[serde(default)]
  pub exclusive: bool,
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn parse_minimal_manifest() {
    let manifest: PackageManifest = serde_json::from_str(r#"{"name": "pkg"}"#).unwrap();
    assert_eq!(manifest.name, "pkg");
    assert!(manifest.version.is_none());
    assert!(manifest.esy.is_none());
    assert!(manifest.resolved.is_none());
  }

  #[test]
  fn parse_full_esy_block() {
    let manifest: PackageManifest = serde_json::from_str(
      r#"{
        "name": "pkg",
        "version": "1.0.0",
        "esy": {
          "build": ["./configure", "make"],
          "buildsInSource": true,
          "exportedEnv": {
            "pkg__flags": {"val": "-O2"},
            "CAML_LD_LIBRARY_PATH": {"val": "$pkg__lib", "scope": "global", "exclusive": true}
          }
        },
        "_resolved": "https://registry.example/pkg/-/pkg-1.0.0.tgz"
      }"#,
    )
    .unwrap();

    let esy = manifest.esy.unwrap();
    assert_eq!(
      esy.build.unwrap().to_commands(),
      vec!["./configure".to_string(), "make".to_string()]
    );
    assert!(esy.builds_in_source);
    assert_eq!(esy.exported_env.len(), 2);
    let global = &esy.exported_env["CAML_LD_LIBRARY_PATH"];
    assert_eq!(global.scope.as_deref(), Some("global"));
    assert!(global.exclusive);
    assert!(manifest.resolved.is_some());
  }

  #[test]
  fn single_command_promotes_to_sequence() {
    let list: CommandList = serde_json::from_str(r#""make install""#).unwrap();
    assert_eq!(list.to_commands(), vec!["make install".to_string()]);
  }

  #[test]
  fn exported_env_preserves_manifest_order() {
    let manifest: PackageManifest = serde_json::from_str(
      r#"{
        "name": "pkg",
        "esy": {"exportedEnv": {"z": {"val": "1"}, "a": {"val": "2"}, "m": {"val": "3"}}}
      }"#,
    )
    .unwrap();

    let esy = manifest.esy.unwrap();
    let names: Vec<&String> = esy.exported_env.keys().collect();
    assert_eq!(names, vec!["z", "a", "m"]);
  }

  #[test]
  fn null_export_value_parses() {
    let entry: ExportedEnv = serde_json::from_str(r#"{"val": null}"#).unwrap();
    assert!(entry.val.is_none());
  }

  #[test]
  fn declared_dependencies_union_preserves_order_and_dedups() {
    let manifest: PackageManifest = serde_json::from_str(
      r#"{
        "name": "pkg",
        "dependencies": {"a": "^1.0.0", "b": "*"},
        "peerDependencies": {"a": "^1.0.0", "c": "2.x", "b": "1.0.0"},
        "devDependencies": {"d": "*"}
      }"#,
    )
    .unwrap();

    let deps = manifest.declared_dependencies();
    let names: Vec<&str> = deps.iter().map(|(n, _)| n.as_str()).collect();
    // `a@^1.0.0` appears twice and collapses; `b` differs by version spec so
    // both entries survive the union.
    assert_eq!(names, vec!["a", "b", "c", "b"]);
  }

  #[test]
  fn read_not_found_is_distinguished() {
    let temp = TempDir::new().unwrap();
    let result = PackageManifest::read(&temp.path().join("package.json"));
    assert!(matches!(result, Err(ManifestError::NotFound(_))));
  }

  #[test]
  fn read_invalid_json_is_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("package.json");
    std::fs::write(&path, "{not json").unwrap();
    let result = PackageManifest::read(&path);
    assert!(matches!(result, Err(ManifestError::Parse { .. })));
  }
}
