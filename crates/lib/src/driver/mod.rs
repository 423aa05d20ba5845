//! The build driver.
//!
//! Schedules dependency-ordered execution over a worker pool sized to the
//! host CPU count. Scheduling rides on the asynchronous topological fold:
//! each task's memo cell holds its in-flight computation, so a build
//! referenced through several parents joins one execution. A task awaits all
//! of its direct dependencies before anything else; a failed dependency
//! short-circuits the dependent to failure without it ever entering
//! `in-progress`.
//!
//! Caching policy:
//! - persisted builds: existence of the final install path is proof the
//!   artifact is current;
//! - development builds: the source-tree mtime checksum decides;
//! - either way, a re-executed dependency invalidates the dependent's
//!   artifact so downstream trees pick up the new dependency references.

pub mod checksum;
pub mod perform;
pub mod rewrite;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::BuildConfig;
use crate::graph::{self, SharedFold};
use crate::sandbox::BuildSandbox;
use crate::store;
use crate::task::BuildTask;

pub use types::{null_status_handler, BuildError, BuildOptions, StatusHandler, TaskStatus};

/// Terminal state of one task, shared between all of its dependents.
#[derive(Debug, Clone)]
enum TaskFinish {
  Built { cached: bool, forced: bool },
  Failed(Arc<BuildError>),
}

struct DriverContext {
  config: BuildConfig,
  options: BuildOptions,
  on_status: StatusHandler,
  root_id: String,
}

/// Build the root task and everything it depends on.
///
/// `on_status` observes every task's transitions. The driver drains in-flight
/// sibling work before returning, even when a task fails.
pub async fn build(
  root: &Arc<BuildTask>,
  sandbox: &BuildSandbox,
  config: &BuildConfig,
  options: &BuildOptions,
  on_status: StatusHandler,
) -> Result<(), BuildError> {
  store::init_store(config)?;

  info!(root = %root.id, concurrency = options.concurrency, "starting build");

  let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
  let context = Arc::new(DriverContext {
    config: config.clone(),
    options: options.clone(),
    on_status,
    root_id: sandbox.root.id.clone(),
  });

  let reducer = {
    let context = Arc::clone(&context);
    let semaphore = Arc::clone(&semaphore);
    move |deps: Vec<SharedFold<TaskFinish>>, task: Arc<BuildTask>| -> BoxFuture<'static, TaskFinish> {
      let context = Arc::clone(&context);
      let semaphore = Arc::clone(&semaphore);
      async move { run_task(task, deps, context, semaphore).await }.boxed()
    }
  };

  match graph::topological_fold_async(root, &reducer).await {
    TaskFinish::Built { cached, forced } => {
      info!(root = %root.id, cached, forced, "build complete");
      Ok(())
    }
    TaskFinish::Failed(e) => Err(BuildError::RootFailed {
      id: root.id.clone(),
      message: e.to_string(),
    }),
  }
}

async fn run_task(
  task: Arc<BuildTask>,
  deps: Vec<SharedFold<TaskFinish>>,
  context: Arc<DriverContext>,
  semaphore: Arc<Semaphore>,
) -> TaskFinish {
  // Await every direct dependency before deciding anything; this both
  // enforces ordering and drains sibling work on failure.
  let mut dep_forced = false;
  let mut dep_failed = false;
  for dep in deps {
    match dep.await {
      TaskFinish::Built { cached, forced } => dep_forced |= forced || !cached,
      TaskFinish::Failed(_) => dep_failed = true,
    }
  }

  if dep_failed {
    let error = BuildError::DependenciesNotBuilt;
    (context.on_status)(&task, &TaskStatus::Failure { error: error.to_string() });
    return TaskFinish::Failed(Arc::new(error));
  }

  (context.on_status)(&task, &TaskStatus::InProgress);
  let started = Instant::now();

  match execute_task(&task, dep_forced, &context, &semaphore).await {
    Ok((cached, forced)) => {
      let status = TaskStatus::Success {
        time_ms: started.elapsed().as_millis() as u64,
        cached,
        forced,
      };
      (context.on_status)(&task, &status);
      TaskFinish::Built { cached, forced }
    }
    Err(e) => {
      error!(id = %task.id, error = %e, "build failed");
      (context.on_status)(&task, &TaskStatus::Failure { error: e.to_string() });
      TaskFinish::Failed(Arc::new(e))
    }
  }
}

/// Decide between cache hit and (re)build; returns `(cached, forced)`.
async fn execute_task(
  task: &Arc<BuildTask>,
  dep_forced: bool,
  context: &DriverContext,
  semaphore: &Semaphore,
) -> Result<(bool, bool), BuildError> {
  let spec = &task.spec;
  let config = &context.config;
  let artifact_exists = config.final_install_path(spec).exists();
  let is_root = task.id == context.root_id;

  if spec.should_be_persisted {
    if artifact_exists && !dep_forced {
      debug!(id = %task.id, "persisted artifact present, skipping");
      return Ok((true, false));
    }

    let _permit = semaphore.acquire().await.unwrap();
    perform::perform_build(task, config, &context.options, is_root).await?;
    return Ok((false, artifact_exists));
  }

  // Development build: compare the source tree against what the last
  // successful build saw.
  let source_checksum = checksum::source_mtime_checksum(&config.source_path(spec))?;
  let stored = checksum::read_checksum(&config.build_path(spec));

  if artifact_exists && !dep_forced && stored.as_deref() == Some(source_checksum.as_str()) {
    debug!(id = %task.id, "source unchanged, skipping");
    return Ok((true, false));
  }

  let _permit = semaphore.acquire().await.unwrap();
  perform::perform_build(task, config, &context.options, is_root).await?;
  checksum::write_checksum(&config.build_path(spec), &source_checksum)?;

  Ok((false, artifact_exists))
}
