//! Shared fixtures for end-to-end tests: tiny sandboxes written to a temp
//! directory, driven through crawl → plan → build with a recording status
//! handler.

// Each test crate links its own copy; not all of them use every helper.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use esy_core::config::BuildConfig;
use esy_core::driver::{self, BuildError, BuildOptions, StatusHandler, TaskStatus};
use esy_core::sandbox::BuildSandbox;
use esy_core::task::BuildTask;

/// Write a `package.json` under `dir`.
pub fn write_package(dir: &Path, body: serde_json::Value) {
  std::fs::create_dir_all(dir).unwrap();
  std::fs::write(dir.join("package.json"), serde_json::to_string_pretty(&body).unwrap()).unwrap();
}

/// A test workspace: the sandbox lives apart from the stores so store writes
/// never disturb source-tree change detection.
pub struct Workspace {
  pub temp: TempDir,
  pub sandbox_path: PathBuf,
}

impl Workspace {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let sandbox_path = temp.path().join("sandbox");
    std::fs::create_dir_all(&sandbox_path).unwrap();
    Workspace { temp, sandbox_path }
  }

  pub fn config(&self) -> BuildConfig {
    BuildConfig::new(
      self.temp.path().join("store"),
      self.temp.path().join("local-store"),
      self.sandbox_path.clone(),
    )
  }

  pub fn dep_dir(&self, name: &str) -> PathBuf {
    self.sandbox_path.join("node_modules").join(name)
  }

  pub fn crawl(&self) -> BuildSandbox {
    BuildSandbox::from_directory(&self.sandbox_path).unwrap()
  }

  pub fn plan(&self) -> (BuildSandbox, Arc<BuildTask>, BuildConfig) {
    let sandbox = self.crawl();
    let config = self.config();
    let root = BuildTask::plan(&sandbox, &config).unwrap();
    (sandbox, root, config)
  }

  /// Crawl, plan and build, recording every status transition.
  pub async fn build(&self) -> (Result<(), BuildError>, StatusRecorder, Arc<BuildTask>, BuildConfig) {
    let (sandbox, root, config) = self.plan();
    let recorder = StatusRecorder::default();
    let result = driver::build(&root, &sandbox, &config, &BuildOptions::default(), recorder.handler()).await;
    (result, recorder, root, config)
  }
}

/// Records `(package name, status)` pairs as the driver reports them.
#[derive(Clone, Default)]
pub struct StatusRecorder {
  events: Arc<Mutex<Vec<(String, TaskStatus)>>>,
}

impl StatusRecorder {
  pub fn handler(&self) -> StatusHandler {
    let events = Arc::clone(&self.events);
    Arc::new(move |task, status| {
      events.lock().unwrap().push((task.spec.name.clone(), status.clone()));
    })
  }

  pub fn events(&self) -> Vec<(String, TaskStatus)> {
    self.events.lock().unwrap().clone()
  }

  /// The terminal success status of a package, if any.
  pub fn success_of(&self, package: &str) -> Option<(bool, bool)> {
    self.events().into_iter().rev().find_map(|(name, status)| match status {
      TaskStatus::Success { cached, forced, .. } if name == package => Some((cached, forced)),
      _ => None,
    })
  }

  pub fn failure_of(&self, package: &str) -> Option<String> {
    self.events().into_iter().rev().find_map(|(name, status)| match status {
      TaskStatus::Failure { error } if name == package => Some(error),
      _ => None,
    })
  }

  pub fn saw_in_progress(&self, package: &str) -> bool {
    self
      .events()
      .iter()
      .any(|(name, status)| name == package && *status == TaskStatus::InProgress)
  }
}
