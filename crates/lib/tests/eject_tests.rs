//! End-to-end eject scenarios over crawled sandboxes.

mod common;

use common::{write_package, Workspace};
use serde_json::json;

use esy_core::eject;

#[tokio::test]
async fn exclusive_conflict_names_both_manifest_paths() {
  let ws = Workspace::new();
  write_package(
    &ws.sandbox_path,
    json!({"name": "root", "dependencies": {"a": "*", "b": "*"}}),
  );
  write_package(
    &ws.dep_dir("a"),
    json!({
      "name": "a",
      "version": "1.0.0",
      "esy": {"exportedEnv": {"CONFLICT": {"val": "from-a", "exclusive": true}}}
    }),
  );
  write_package(
    &ws.dep_dir("b"),
    json!({
      "name": "b",
      "version": "1.0.0",
      "esy": {"exportedEnv": {"CONFLICT": {"val": "from-b"}}}
    }),
  );

  let sandbox = ws.crawl();
  let ejected = eject::eject_root_environment(&sandbox, &ws.config());

  let conflict: Vec<&String> = ejected
    .diagnostics
    .iter()
    .filter(|d| d.contains("cannot be overridden"))
    .collect();
  assert_eq!(conflict.len(), 1);
  assert!(conflict[0].contains("CONFLICT"));
  assert!(conflict[0].contains("node_modules/a/package.json"));
  assert!(conflict[0].contains("node_modules/b/package.json"));
}

#[tokio::test]
async fn rendered_dump_is_parseable_and_sourceable() {
  let ws = Workspace::new();
  write_package(
    &ws.sandbox_path,
    json!({
      "name": "root",
      "dependencies": {"dep": "*"},
      "esy": {"exportedEnv": {"root__flag": {"val": "with \"quotes\""}}}
    }),
  );
  write_package(
    &ws.dep_dir("dep"),
    json!({
      "name": "dep",
      "version": "1.0.0",
      "esy": {"exportedEnv": {"dep__home": {"val": "$dep__install"}}},
      "_resolved": "https://registry.example/dep-1.0.0.tgz"
    }),
  );

  let sandbox = ws.crawl();
  let config = ws.config();
  let ejected = eject::eject_root_environment(&sandbox, &config);
  let rendered = eject::render(&ejected);

  // Groups: seeds, dep, root.
  assert!(rendered.contains("# sandbox environment"));
  assert!(rendered.contains("# dep@1.0.0"));
  assert!(rendered.starts_with("# "));

  let parsed = eject::parse(&rendered);
  let lookup = |name: &str| {
    parsed
      .iter()
      .rev()
      .find(|(n, _)| n == name)
      .map(|(_, v)| v.clone())
  };

  // Stringify → parse recovers exact values, quotes included.
  assert_eq!(lookup("root__flag").unwrap(), "with \"quotes\"");

  // The dependency's export substituted through its own built-in scope.
  let dep = &sandbox.root.dependencies[0];
  assert_eq!(
    lookup("dep__home").unwrap(),
    config.final_install_path(dep).display().to_string()
  );

  // Built-ins for both prefixes are present.
  assert!(lookup("dep__install").is_some());
  assert!(lookup("cur__install").is_some());
}

#[tokio::test]
async fn producer_value_flows_into_consumer_export() {
  let ws = Workspace::new();
  write_package(
    &ws.sandbox_path,
    json!({
      "name": "root",
      "dependencies": {"prefix": "*"},
      "esy": {"exportedEnv": {"root__consumer": {"val": "$prefix__v"}}}
    }),
  );
  write_package(
    &ws.dep_dir("prefix"),
    json!({
      "name": "prefix",
      "version": "1.0.0",
      "esy": {"exportedEnv": {"prefix__v": {"val": "x"}}}
    }),
  );

  let (_sandbox, root, _config) = ws.plan();

  // The consumer's rendered value is the producer's, and the producer's
  // local export is visible in the dependent's composed environment.
  assert_eq!(root.env["root__consumer"], "x");
  assert_eq!(root.env["prefix__v"], "x");
}
