//! Store layout and per-build path computation.
//!
//! Both stores (shared and sandbox-local) have the same shape:
//!
//! ```text
//! <store>/_build/<id>/...      build scratch, incl. _esy/{env, findlib.conf, log, checksum}
//! <store>/_insttmp/<id>/...    pre-rename staging
//! <store>/_install/<id>/...    final, atomic; existence implies success
//! ```
//!
//! `_insttmp` and `_install` are both eight characters, which is what makes
//! in-place path rewriting possible: the staged install path and the final
//! install path of a build always have equal length.

use std::path::{Path, PathBuf};

use crate::platform;
use crate::sandbox::BuildSpec;

/// Store subtree holding build scratch directories.
pub const STORE_BUILD_TREE: &str = "_build";

/// Store subtree holding pre-rename install staging.
pub const STORE_STAGE_TREE: &str = "_insttmp";

/// Store subtree holding finalized installs.
pub const STORE_INSTALL_TREE: &str = "_install";

/// The install sub-directories created for every build.
pub const INSTALL_SUBDIRS: &[&str] = &["lib", "bin", "sbin", "man", "doc", "share", "stublibs", "etc"];

/// Maps builds to their locations on disk.
///
/// Persisted builds land in `store_path`; development builds in
/// `local_store_path`. All functions here are pure: a build's final install
/// location is a function of its identifier alone, so a hit on that path is
/// sufficient proof that the artifact is current.
#[derive(Debug, Clone)]
pub struct BuildConfig {
  pub store_path: PathBuf,
  pub local_store_path: PathBuf,
  pub sandbox_path: PathBuf,
}

impl BuildConfig {
  pub fn new(store_path: PathBuf, local_store_path: PathBuf, sandbox_path: PathBuf) -> Self {
    BuildConfig {
      store_path,
      local_store_path,
      sandbox_path,
    }
  }

  /// Default configuration for a sandbox: the shared store under
  /// `~/.esy/store` (overridable via `ESY__PREFIX`) and the local store
  /// under the sandbox's module cache.
  pub fn for_sandbox(sandbox_path: &Path) -> Self {
    let prefix = std::env::var(platform::PREFIX_VAR)
      .map(PathBuf::from)
      .unwrap_or_else(|_| platform::home_dir().join(".esy"));

    BuildConfig {
      store_path: prefix.join("store"),
      local_store_path: sandbox_path
        .join("node_modules")
        .join(".cache")
        .join("_esy")
        .join("store"),
      sandbox_path: sandbox_path.to_path_buf(),
    }
  }

  /// The store a spec's artifacts belong to.
  pub fn store_for(&self, spec: &BuildSpec) -> &Path {
    if spec.should_be_persisted {
      &self.store_path
    } else {
      &self.local_store_path
    }
  }

  /// Where the package's sources live.
  pub fn source_path(&self, spec: &BuildSpec) -> PathBuf {
    self.sandbox_path.join(&spec.source_path)
  }

  /// Where the build runs: the source tree, unless the build mutates its
  /// sources, in which case a staged copy under the build tree.
  pub fn root_path(&self, spec: &BuildSpec) -> PathBuf {
    if spec.mutates_source_path {
      self.build_path(spec)
    } else {
      self.source_path(spec)
    }
  }

  /// Build scratch directory.
  pub fn build_path(&self, spec: &BuildSpec) -> PathBuf {
    self.store_for(spec).join(STORE_BUILD_TREE).join(&spec.id)
  }

  /// Temporary install staging, renamed into place on success.
  pub fn install_path(&self, spec: &BuildSpec) -> PathBuf {
    self.store_for(spec).join(STORE_STAGE_TREE).join(&spec.id)
  }

  /// Final, id-addressed install location.
  pub fn final_install_path(&self, spec: &BuildSpec) -> PathBuf {
    self.store_for(spec).join(STORE_INSTALL_TREE).join(&spec.id)
  }
}
