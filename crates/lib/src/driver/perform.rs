//! Per-build execution.
//!
//! Runs one build from scratch paths to a finalized install: clean residue,
//! lay out the scratch and staging trees, stage sources for in-source
//! builds, write the environment and findlib files, run the commands under
//! the composed environment with both output streams interleaved into the
//! build log, rewrite staged paths and atomically rename the install into
//! its final id-addressed location.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command as ProcessCommand;
use tokio::sync::Mutex;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::{BuildConfig, INSTALL_SUBDIRS};
use crate::driver::rewrite;
use crate::driver::types::{BuildError, BuildOptions};
use crate::eject::escape_value;
use crate::graph;
use crate::task::{BuildTask, Command};

/// Directory names never staged into an in-source build copy.
const COPY_EXCLUDES: &[&str] = &["_build", "_install", "node_modules"];

/// Execute a single build to completion.
pub async fn perform_build(
  task: &Arc<BuildTask>,
  config: &BuildConfig,
  options: &BuildOptions,
  is_root: bool,
) -> Result<(), BuildError> {
  let spec = &task.spec;
  let build_path = config.build_path(spec);
  let install_path = config.install_path(spec);
  let final_install_path = config.final_install_path(spec);
  let root_path = config.root_path(spec);

  info!(id = %task.id, "building");

  // Clean residue from interrupted runs.
  for path in [&final_install_path, &install_path, &build_path] {
    remove_if_exists(path).await?;
  }

  // Scratch and staging layout.
  let esy_dir = build_path.join("_esy");
  fs::create_dir_all(&esy_dir).await?;
  for subdir in INSTALL_SUBDIRS {
    fs::create_dir_all(install_path.join(subdir)).await?;
  }

  // In-source builds run from a staged copy, never the pristine sources.
  if spec.mutates_source_path {
    copy_source_tree(&config.source_path(spec), &build_path).await?;
  }

  write_env_file(&esy_dir.join("env"), task).await?;

  let dep_lib_paths: Vec<PathBuf> = graph::collect_transitive_dependencies(task)
    .iter()
    .map(|dep| config.final_install_path(&dep.spec).join("lib"))
    .collect();
  write_findlib_conf(&esy_dir.join("findlib.conf"), &dep_lib_paths, &install_path.join("lib")).await?;

  let profile_path = esy_dir.join("sandbox.sb");
  if cfg!(target_os = "macos") {
    write_sandbox_profile(&profile_path, &build_path, &install_path, &options.sandbox_allow).await?;
  }

  if !task.command.is_empty() {
    let log_path = esy_dir.join("log");
    let log = Arc::new(Mutex::new(fs::File::create(&log_path).await?));

    for command in &task.command {
      run_command(command, task, &root_path, &profile_path, &log, &log_path).await?;
    }

    let mut log_file = log.lock().await;
    log_file.flush().await?;
  }

  // Make the staged tree speak in final paths, then expose it atomically.
  rewrite::rewrite_prefix(&install_path, &install_path, &final_install_path).await?;
  write_findlib_conf(
    &esy_dir.join("findlib.conf"),
    &dep_lib_paths,
    &final_install_path.join("lib"),
  )
  .await?;
  fs::rename(&install_path, &final_install_path).await?;

  if is_root {
    replace_symlink(&final_install_path, &config.sandbox_path.join("_install")).await?;
    replace_symlink(&build_path, &config.sandbox_path.join("_build")).await?;
  }

  debug!(id = %task.id, install = %final_install_path.display(), "build finalized");
  Ok(())
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path).await {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

fn excluded_from_copy(entry: &DirEntry) -> bool {
  entry.file_type().is_dir()
    && entry
      .file_name()
      .to_str()
      .map(|name| COPY_EXCLUDES.contains(&name))
      .unwrap_or(false)
}

async fn copy_source_tree(from: &Path, to: &Path) -> io::Result<()> {
  for entry in WalkDir::new(from).into_iter().filter_entry(|e| !excluded_from_copy(e)) {
    let entry = entry.map_err(io::Error::from)?;
    let relative = match entry.path().strip_prefix(from) {
      Ok(relative) if !relative.as_os_str().is_empty() => relative,
      _ => continue,
    };
    let target = to.join(relative);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target).await?;
    } else if entry.file_type().is_file() {
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
      }
      fs::copy(entry.path(), &target).await?;
    }
  }
  Ok(())
}

/// Write the sourceable environment file.
pub(crate) async fn write_env_file(path: &Path, task: &BuildTask) -> io::Result<()> {
  let mut content = String::new();
  for (name, value) in &task.env {
    content.push_str(&format!("export {}=\"{}\";\n", name, escape_value(value)));
  }
  fs::write(path, content).await
}

/// Write findlib configuration pointing package lookups at the dependency
/// set and installs at `destdir_lib`.
pub(crate) async fn write_findlib_conf(path: &Path, dep_lib_paths: &[PathBuf], destdir_lib: &Path) -> io::Result<()> {
  let mut paths: Vec<String> = dep_lib_paths.iter().map(|p| p.display().to_string()).collect();
  paths.push(destdir_lib.display().to_string());

  let content = format!(
    concat!(
      "path = \"{}\"\n",
      "destdir = \"{}\"\n",
      "ldconf = \"ignore\"\n",
      "ocamlc = \"ocamlc.opt\"\n",
      "ocamlopt = \"ocamlopt.opt\"\n",
      "ocamlcp = \"ocamlcp.opt\"\n",
      "ocamldep = \"ocamldep.opt\"\n",
      "ocamldoc = \"ocamldoc.opt\"\n",
      "ocamllex = \"ocamllex.opt\"\n",
    ),
    paths.join(":"),
    destdir_lib.display(),
  );

  fs::write(path, content).await
}

/// Write the platform sandbox profile: writes denied everywhere except the
/// build scratch, the install staging, `/dev/null`, the temp directory and
/// the operator-configured allow list.
pub(crate) async fn write_sandbox_profile(
  path: &Path,
  build_path: &Path,
  install_path: &Path,
  extra_allow: &[PathBuf],
) -> io::Result<()> {
  let mut allows = vec![
    "  (literal \"/dev/null\")".to_string(),
    format!("  (subpath \"{}\")", build_path.display()),
    format!("  (subpath \"{}\")", install_path.display()),
    format!("  (subpath \"{}\")", std::env::temp_dir().display()),
  ];
  for path in extra_allow {
    allows.push(format!("  (subpath \"{}\")", path.display()));
  }

  let content = format!(
    "(version 1)\n(allow default)\n(deny file-write*\n  (subpath \"/\"))\n(allow file-write*\n{})\n",
    allows.join("\n"),
  );

  fs::write(path, content).await
}

async fn run_command(
  command: &Command,
  task: &Arc<BuildTask>,
  cwd: &Path,
  profile_path: &Path,
  log: &Arc<Mutex<fs::File>>,
  log_path: &Path,
) -> Result<(), BuildError> {
  info!(id = %task.id, cmd = %command.rendered, "running build command");

  let mut process = shell_command(&command.rendered, profile_path);
  process
    .current_dir(cwd)
    .env_clear()
    .envs(task.env.iter())
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

  let mut child = process.spawn()?;
  let stdout = child.stdout.take();
  let stderr = child.stderr.take();

  tokio::try_join!(pump(stdout, Arc::clone(log)), pump(stderr, Arc::clone(log)))?;

  let status = child.wait().await?;
  if !status.success() {
    return Err(BuildError::CommandFailed {
      command: command.raw.clone(),
      code: status.code(),
      log: log_path.to_path_buf(),
    });
  }

  Ok(())
}

/// Interleave a child stream into the shared build log.
async fn pump<R>(stream: Option<R>, log: Arc<Mutex<fs::File>>) -> io::Result<()>
where
  R: AsyncRead + Unpin,
{
  let Some(mut stream) = stream else {
    return Ok(());
  };

  let mut buf = [0u8; 8192];
  loop {
    let n = stream.read(&mut buf).await?;
    if n == 0 {
      return Ok(());
    }
    let mut file = log.lock().await;
    file.write_all(&buf[..n]).await?;
  }
}

/// Shell invocation for a rendered command, wrapped in the platform sandbox
/// where one exists.
fn shell_command(rendered: &str, profile_path: &Path) -> ProcessCommand {
  #[cfg(target_os = "macos")]
  {
    let mut command = ProcessCommand::new("sandbox-exec");
    command
      .arg("-f")
      .arg(profile_path)
      .arg("--")
      .arg("/bin/sh")
      .arg("-c")
      .arg(rendered);
    command
  }

  #[cfg(all(unix, not(target_os = "macos")))]
  {
    let _ = profile_path;
    let mut command = ProcessCommand::new("/bin/sh");
    command.arg("-c").arg(rendered);
    command
  }

  #[cfg(windows)]
  {
    let _ = profile_path;
    let mut command = ProcessCommand::new("cmd.exe");
    command.arg("/C").arg(rendered);
    command
  }
}

async fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
  match fs::remove_file(link).await {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }

  #[cfg(unix)]
  {
    fs::symlink(target, link).await
  }

  #[cfg(windows)]
  {
    fs::symlink_dir(target, link).await
  }
}
