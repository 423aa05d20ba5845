//! Change detection for development builds.
//!
//! Non-persisted builds have no immutable source, so artifact existence
//! alone proves nothing. Instead the driver checksums the source tree's
//! modification times: any touched file changes the checksum and triggers a
//! rebuild, while an untouched tree never does. The checksum from the last
//! successful build lives at `<build_path>/_esy/checksum`.

use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use sha1::{Digest, Sha1};
use walkdir::{DirEntry, WalkDir};

/// Directory names excluded from the source walk.
pub const CHECKSUM_IGNORE: &[&str] = &["node_modules", "_build", "_install", "_esy"];

fn ignored(entry: &DirEntry) -> bool {
  entry.file_type().is_dir()
    && entry
      .file_name()
      .to_str()
      .map(|name| CHECKSUM_IGNORE.contains(&name))
      .unwrap_or(false)
}

/// Checksum the modification times of every file under `root`.
///
/// Mtimes are collected as strings, sorted by file path and fed into SHA-1
/// in that order, so the result does not depend on directory iteration
/// order.
pub fn source_mtime_checksum(root: &Path) -> io::Result<String> {
  let mut entries: Vec<(String, String)> = Vec::new();

  for entry in WalkDir::new(root).into_iter().filter_entry(|e| !ignored(e)) {
    let entry = entry.map_err(io::Error::from)?;
    if !entry.file_type().is_file() {
      continue;
    }
    let modified = entry.metadata().map_err(io::Error::from)?.modified()?;
    let mtime = modified.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos().to_string();
    entries.push((entry.path().display().to_string(), mtime));
  }

  entries.sort_by(|a, b| a.0.cmp(&b.0));

  let mut hasher = Sha1::new();
  for (_, mtime) in &entries {
    hasher.update(mtime.as_bytes());
  }

  Ok(format!("{:x}", hasher.finalize()))
}

/// Read the checksum recorded by the last successful build, if any.
pub fn read_checksum(build_path: &Path) -> Option<String> {
  std::fs::read_to_string(build_path.join("_esy").join("checksum"))
    .ok()
    .map(|content| content.trim().to_string())
}

/// Record the checksum of the sources a successful build saw.
pub fn write_checksum(build_path: &Path, checksum: &str) -> io::Result<()> {
  let esy_dir = build_path.join("_esy");
  std::fs::create_dir_all(&esy_dir)?;
  std::fs::write(esy_dir.join("checksum"), checksum)
}
