//! Types for the build driver.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::store::StoreError;
use crate::task::BuildTask;

/// Observable per-task lifecycle: `pending → in-progress → (success | failure)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
  InProgress,

  Success {
    /// Wall-clock time for this task, including cache checks.
    time_ms: u64,
    /// The artifact was already current; nothing ran.
    cached: bool,
    /// An existing artifact was invalidated and rebuilt.
    forced: bool,
  },

  Failure {
    error: String,
  },
}

/// Callback invoked with every status transition.
pub type StatusHandler = Arc<dyn Fn(&Arc<BuildTask>, &TaskStatus) + Send + Sync>;

/// A status handler that ignores every event.
pub fn null_status_handler() -> StatusHandler {
  Arc::new(|_, _| {})
}

/// Errors produced while driving builds.
#[derive(Debug, Error)]
pub enum BuildError {
  /// A build command exited non-zero. The interleaved log rides along.
  #[error("command failed with exit code {code:?}: {command} (see {log})")]
  CommandFailed {
    command: String,
    code: Option<i32>,
    log: PathBuf,
  },

  /// A direct dependency failed, so this task never started.
  #[error("dependencies are not built")]
  DependenciesNotBuilt,

  /// In-place rewriting requires both paths to have equal length; the store
  /// layout guarantees it, so this means the configuration is corrupt.
  #[error("install path {install} and final install path {final_install} differ in length")]
  RewriteLengthMismatch { install: PathBuf, final_install: PathBuf },

  /// The root task failed; details were reported through the status handler.
  #[error("build failed for {id}: {message}")]
  RootFailed { id: String, message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  /// Worker-pool width; defaults to the logical CPU count.
  pub concurrency: usize,

  /// Extra paths the platform sandbox profile allows writes to.
  pub sandbox_allow: Vec<PathBuf>,
}

impl Default for BuildOptions {
  fn default() -> Self {
    BuildOptions {
      concurrency: std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4),
      sandbox_allow: Vec::new(),
    }
  }
}
