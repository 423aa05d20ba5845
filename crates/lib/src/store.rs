//! Store lifecycle.
//!
//! Creates the three store subtrees at both the shared and the sandbox-local
//! store and verifies their existence. Stores are plain directory trees; the
//! atomic rename from staging into `_install` is what gives finalized
//! artifacts their all-or-nothing property.

use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::config::{BuildConfig, STORE_BUILD_TREE, STORE_INSTALL_TREE, STORE_STAGE_TREE};

/// The three subtrees every store carries.
pub const STORE_TREES: &[&str] = &[STORE_BUILD_TREE, STORE_STAGE_TREE, STORE_INSTALL_TREE];

/// Errors during store creation.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to create store directory: {0}")]
  CreateDir(#[source] io::Error),
}

/// Create the store subtrees at both configured store roots.
///
/// Idempotent: existing trees are left untouched.
pub fn init_store(config: &BuildConfig) -> Result<(), StoreError> {
  for root in [&config.store_path, &config.local_store_path] {
    for tree in STORE_TREES {
      let path = root.join(tree);
      std::fs::create_dir_all(&path).map_err(StoreError::CreateDir)?;
      debug!(path = %path.display(), "store tree ready");
    }
  }
  Ok(())
}

/// Whether a store root carries all three subtrees.
pub fn store_ready(root: &Path) -> bool {
  STORE_TREES.iter().all(|tree| root.join(tree).is_dir())
}
