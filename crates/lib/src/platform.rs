//! Host platform identification and the seeded process environment.
//!
//! Every sandbox starts from a small set of variables taken from the host
//! process: `PATH`, `SHELL` and the esy platform identifiers. These seeds are
//! part of the build-identifier input, so they are also what the well-known
//! test flag freezes to make fixture output diffable.

use std::env;
use std::path::PathBuf;

/// Environment flag that switches the whole crate into fixture mode.
///
/// When set, the seeded environment is frozen to fixed values and build
/// identifiers omit their hash suffix. Never set in production.
pub const TEST_MODE_VAR: &str = "ESY__TEST";

/// Environment variable overriding the shared store prefix.
pub const PREFIX_VAR: &str = "ESY__PREFIX";

/// Returns true when the well-known test flag is present.
pub fn test_mode() -> bool {
  env::var_os(TEST_MODE_VAR).is_some()
}

/// Platform identifier as seeded into `esy__platform`.
///
/// Uses the node-style names (`darwin`, `win32`) because manifests in the
/// ecosystem match against those.
pub fn platform_id() -> &'static str {
  match env::consts::OS {
    "macos" => "darwin",
    "windows" => "win32",
    other => other,
  }
}

/// Architecture identifier as seeded into `esy__architecture`.
pub fn architecture_id() -> &'static str {
  match env::consts::ARCH {
    "x86_64" => "x64",
    "aarch64" => "arm64",
    other => other,
  }
}

/// Returns the user's home directory.
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = env::var("USERPROFILE").expect("USERPROFILE not set");
  PathBuf::from(userprofile)
}

/// Returns the user's home directory.
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}

/// The environment seeded from the host process, in seeding order.
///
/// The target platform/architecture default to the host; cross builds
/// override them through the process environment before crawling.
pub fn initial_environment() -> Vec<(String, String)> {
  if test_mode() {
    return vec![
      ("PATH".to_string(), "/usr/bin:/bin".to_string()),
      ("SHELL".to_string(), "/bin/sh".to_string()),
      ("esy__platform".to_string(), "linux".to_string()),
      ("esy__architecture".to_string(), "x64".to_string()),
      ("esy__target_platform".to_string(), "linux".to_string()),
      ("esy__target_architecture".to_string(), "x64".to_string()),
    ];
  }

  let platform = env::var("esy__platform").unwrap_or_else(|_| platform_id().to_string());
  let architecture = env::var("esy__architecture").unwrap_or_else(|_| architecture_id().to_string());
  let target_platform = env::var("esy__target_platform").unwrap_or_else(|_| platform.clone());
  let target_architecture = env::var("esy__target_architecture").unwrap_or_else(|_| architecture.clone());

  vec![
    ("PATH".to_string(), env::var("PATH").unwrap_or_default()),
    ("SHELL".to_string(), env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())),
    ("esy__platform".to_string(), platform),
    ("esy__architecture".to_string(), architecture),
    ("esy__target_platform".to_string(), target_platform),
    ("esy__target_architecture".to_string(), target_architecture),
  ]
}
