//! Post-install path rewriting.
//!
//! Build outputs frequently embed their own install prefix in scripts,
//! `.cmxs` metadata and pkg-config files. After a successful build the
//! staged install tree is scanned and every occurrence of the staging path
//! is overwritten in place with the final path. The store layout keeps both
//! paths the same length (`_insttmp` vs `_install`), which is what makes an
//! in-place overwrite sound.
//!
//! File I/O fans out over a bounded queue so large install trees do not
//! serialize on a single file at a time.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;
use walkdir::WalkDir;

use super::types::BuildError;

/// Width of the rewrite queue.
const REWRITE_CONCURRENCY: usize = 20;

/// Rewrite every occurrence of `from` to `to` in regular files under `dir`.
///
/// Returns the number of files that changed. Fails before touching anything
/// when the two paths differ in length.
pub async fn rewrite_prefix(dir: &Path, from: &Path, to: &Path) -> Result<usize, BuildError> {
  let needle = from.display().to_string().into_bytes();
  let replacement = to.display().to_string().into_bytes();

  if needle.len() != replacement.len() {
    return Err(BuildError::RewriteLengthMismatch {
      install: from.to_path_buf(),
      final_install: to.to_path_buf(),
    });
  }

  let mut files: Vec<PathBuf> = Vec::new();
  for entry in WalkDir::new(dir) {
    let entry = entry.map_err(io::Error::from)?;
    if entry.file_type().is_file() {
      files.push(entry.path().to_path_buf());
    }
  }

  let semaphore = Arc::new(Semaphore::new(REWRITE_CONCURRENCY));
  let mut join_set = JoinSet::new();

  for path in files {
    let needle = needle.clone();
    let replacement = replacement.clone();
    let semaphore = Arc::clone(&semaphore);

    join_set.spawn(async move {
      let _permit = semaphore.acquire().await.unwrap();
      rewrite_file(&path, &needle, &replacement).await
    });
  }

  let mut rewritten = 0;
  while let Some(joined) = join_set.join_next().await {
    match joined {
      Ok(Ok(true)) => rewritten += 1,
      Ok(Ok(false)) => {}
      Ok(Err(e)) => return Err(BuildError::Io(e)),
      Err(e) => return Err(BuildError::Io(io::Error::new(io::ErrorKind::Other, e))),
    }
  }

  debug!(dir = %dir.display(), rewritten, "path rewriting complete");
  Ok(rewritten)
}

async fn rewrite_file(path: &Path, needle: &[u8], replacement: &[u8]) -> io::Result<bool> {
  let mut content = tokio::fs::read(path).await?;
  let mut changed = false;

  let mut i = 0;
  while i + needle.len() <= content.len() {
    if &content[i..i + needle.len()] == needle {
      content[i..i + needle.len()].copy_from_slice(replacement);
      changed = true;
      i += needle.len();
    } else {
      i += 1;
    }
  }

  if changed {
    tokio::fs::write(path, &content).await?;
  }

  Ok(changed)
}
