//! Build-identifier hashing.
//!
//! A build's identifier pins its location in the content-addressed store, so
//! it must depend on the entire transitive build definition: the seeded
//! environment, the manifest's build metadata, the source the package came
//! from and the identifiers of its direct dependencies. Two crawls of the
//! same sandbox produce byte-identical identifiers.
//!
//! # Format
//!
//! `<normalized-name>-<version>-<40 hex chars of SHA-1>`, e.g.
//! `ocaml_findlib-1.9.1-3f786850e387550fdab836ed7e6dc881de23001b`. The
//! identifier is a valid POSIX path component. Under [`TEST_MODE_VAR`] the
//! hash suffix is omitted so fixture output stays diffable.
//!
//! [`TEST_MODE_VAR`]: crate::platform::TEST_MODE_VAR

use serde_json::{json, Value};
use sha1::{Digest, Sha1};

use crate::manifest::PackageManifest;
use crate::platform;

/// Normalize a package name into a POSIX-safe identifier prefix.
///
/// The same normalization yields the variable-name prefix for a package's
/// exported environment, so `@opam/lwt.unix` and its `opam__slash__lwt...`
/// variables line up.
pub fn normalize_package_name(name: &str) -> String {
  name
    .to_lowercase()
    .replace('@', "")
    .replace('_', "__")
    .replace('/', "__slash__")
    .replace('.', "__dot__")
    .replace('-', "_")
}

/// Compute the identifier for a build.
///
/// `source` is the immutable-source URL from the manifest when present,
/// otherwise `local:<realpath-of-source>`. `dependency_ids` must be the
/// direct dependencies' identifiers in declaration order.
pub fn build_spec_id(
  manifest: &PackageManifest,
  initial_env: &[(String, String)],
  source: &str,
  dependency_ids: &[String],
) -> String {
  let name = normalize_package_name(&manifest.name);
  let version = manifest.version.as_deref().unwrap_or("0.0.0");

  if platform::test_mode() {
    return format!("{}-{}", name, version);
  }

  let env: Vec<Value> = initial_env.iter().map(|(n, v)| json!([n, v])).collect();
  let build_metadata = serde_json::to_value(manifest.esy.clone().unwrap_or_default()).unwrap_or(Value::Null);
  let payload = json!({
    "env": env,
    "manifest": {
      "name": manifest.name,
      "version": manifest.version,
      "build": build_metadata,
    },
    "source": source,
    "dependencies": dependency_ids,
  });

  let mut text = String::new();
  canonical_text(&payload, &mut text);

  let mut hasher = Sha1::new();
  hasher.update(text.as_bytes());
  let hex = format!("{:x}", hasher.finalize());

  format!("{}-{}-{}", name, version, hex)
}

/// Serialize a value into its canonical text form.
///
/// Mappings are sorted by key, sequences preserve order, booleans and
/// numbers use their literal decimal forms and string contents pass through
/// untouched. The encoding only needs to be stable, not parseable.
pub fn canonical_text(value: &Value, out: &mut String) {
  match value {
    Value::Null => out.push_str("null"),
    Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
    Value::Number(n) => out.push_str(&n.to_string()),
    Value::String(s) => {
      out.push('"');
      out.push_str(s);
      out.push('"');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        canonical_text(item, out);
      }
      out.push(']');
    }
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push('"');
        out.push_str(key);
        out.push_str("\":");
        canonical_text(&map[key.as_str()], out);
      }
      out.push('}');
    }
  }
}
