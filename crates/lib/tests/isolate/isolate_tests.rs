//! End-to-end isolation of a workspace package.

use fndeploy_lib::isolate::{IsolateOptions, PnpmLockfile, isolate_workspace};
use fndeploy_lib::workspace::PackageManifest;

use super::common::{TarPacker, TestWorkspace, file_set};

const LOCKFILE: &str = r#"lockfileVersion: '9.0'
importers:
  .:
    devDependencies:
      prettier:
        specifier: ^3.0.0
        version: 3.3.0
  apps/foo:
    dependencies:
      bar:
        specifier: workspace:*
        version: link:../../libs/bar
      express:
        specifier: ^4.19.0
        version: 4.19.2
  libs/bar:
    dependencies: {}
  libs/unrelated:
    dependencies: {}
packages:
  express@4.19.2:
    resolution: {integrity: sha512-express}
  prettier@3.3.0:
    resolution: {integrity: sha512-prettier}
"#;

/// `foo` depends on `bar`; `unrelated` is also in the workspace.
fn foo_bar_workspace() -> TestWorkspace {
  foo_bar_workspace_with(&["apps/*", "libs/*"])
}

fn foo_bar_workspace_with(patterns: &[&str]) -> TestWorkspace {
  let ws = TestWorkspace::new(patterns);
  ws.write_file(
    "apps/foo/package.json",
    r#"{
  "name": "foo",
  "version": "1.0.0",
  "main": "lib/index.js",
  "dependencies": {
    "bar": "workspace:*",
    "express": "^4.19.0"
  },
  "engines": { "node": "22" }
}"#,
  );
  ws.write_file("apps/foo/lib/index.js", "require('bar');\n");
  ws.write_file("apps/foo/node_modules/express/index.js", "module.exports = {};\n");
  ws.write_file("libs/bar/package.json", r#"{"name":"bar","version":"0.1.0","main":"index.js"}"#);
  ws.write_file("libs/bar/index.js", "module.exports = 'bar';\n");
  ws.write_file("libs/unrelated/package.json", r#"{"name":"unrelated","version":"0.1.0"}"#);
  ws.write_file("pnpm-lock.yaml", LOCKFILE);
  ws
}

#[tokio::test]
async fn isolates_target_with_internal_dependency() {
  let ws = foo_bar_workspace();

  let result = isolate_workspace(&ws.path("apps/foo"), &IsolateOptions::default(), &TarPacker)
    .await
    .unwrap();

  assert_eq!(result.output_dir, ws.path("apps/foo/isolate"));
  assert_eq!(result.packages, vec!["foo", "bar"]);

  let out = &result.output_dir;
  assert!(out.join("workspaces/bar/index.js").is_file());
  assert!(!out.join("workspaces/bar/package").exists());
  assert!(!out.join("workspaces/unrelated").exists());
  assert!(out.join("lib/index.js").is_file());
  assert!(!out.join("node_modules").exists());

  let manifest = PackageManifest::load(&out.join("package.json")).unwrap();
  let deps = manifest.dependencies.as_ref().unwrap();
  assert_eq!(deps["bar"], "file:./workspaces/bar");
  assert_eq!(deps["express"], "^4.19.0");
  assert_eq!(manifest.extra["main"], "lib/index.js");
  assert!(manifest.extra.contains_key("engines"));

  let lockfile = PnpmLockfile::load(&out.join("pnpm-lock.yaml")).unwrap().unwrap();
  assert_eq!(lockfile.importer_keys(), vec!["apps/foo", "libs/bar"]);
  let packages = lockfile.get("packages").unwrap().as_mapping().unwrap();
  assert_eq!(packages.len(), 2);

  let config = ws.read_file("apps/foo/isolate/pnpm-workspace.yaml");
  assert!(config.contains("workspaces/*"));

  // Sources are left alone
  assert!(ws.read_file("apps/foo/package.json").contains("workspace:*"));
  assert_eq!(
    PnpmLockfile::load(&ws.path("pnpm-lock.yaml")).unwrap().unwrap().importer_keys().len(),
    4
  );
}

#[tokio::test]
async fn rerunning_produces_the_same_bundle() {
  let ws = foo_bar_workspace();
  let options = IsolateOptions::default();

  let first = isolate_workspace(&ws.path("apps/foo"), &options, &TarPacker)
    .await
    .unwrap();
  let files = file_set(&first.output_dir);
  let manifest = ws.read_file("apps/foo/isolate/package.json");
  let bar_manifest = ws.read_file("apps/foo/isolate/workspaces/bar/package.json");
  let lockfile = ws.read_file("apps/foo/isolate/pnpm-lock.yaml");

  let second = isolate_workspace(&ws.path("apps/foo"), &options, &TarPacker)
    .await
    .unwrap();

  assert_eq!(first, second);
  assert_eq!(file_set(&second.output_dir), files);
  assert_eq!(ws.read_file("apps/foo/isolate/package.json"), manifest);
  assert_eq!(ws.read_file("apps/foo/isolate/workspaces/bar/package.json"), bar_manifest);
  assert_eq!(ws.read_file("apps/foo/isolate/pnpm-lock.yaml"), lockfile);
  assert!(!files.iter().any(|f| f.starts_with("isolate/")));
}

#[tokio::test]
async fn rerunning_with_recursive_globs_ignores_previous_bundle() {
  let ws = foo_bar_workspace_with(&["'apps/**'", "'libs/**'"]);
  let options = IsolateOptions::default();

  let first = isolate_workspace(&ws.path("apps/foo"), &options, &TarPacker)
    .await
    .unwrap();
  assert!(ws.path("apps/foo/isolate/workspaces/bar/package.json").is_file());

  let second = isolate_workspace(&ws.path("apps/foo"), &options, &TarPacker)
    .await
    .unwrap();
  assert_eq!(first, second);
  assert_eq!(second.packages, vec!["foo", "bar"]);

  let manifest = PackageManifest::load(&second.output_dir.join("package.json")).unwrap();
  assert_eq!(manifest.dependencies.unwrap()["bar"], "file:./workspaces/bar");
  let lockfile = PnpmLockfile::load(&second.output_dir.join("pnpm-lock.yaml")).unwrap().unwrap();
  assert_eq!(lockfile.importer_keys(), vec!["apps/foo", "libs/bar"]);
}

#[tokio::test]
async fn missing_lockfile_is_skipped() {
  let ws = foo_bar_workspace();
  std::fs::remove_file(ws.path("pnpm-lock.yaml")).unwrap();

  let result = isolate_workspace(&ws.path("apps/foo"), &IsolateOptions::default(), &TarPacker)
    .await
    .unwrap();

  assert!(!result.output_dir.join("pnpm-lock.yaml").exists());
  assert!(result.output_dir.join("workspaces/bar/package.json").is_file());
}

#[tokio::test]
async fn custom_output_directory() {
  let ws = foo_bar_workspace();
  let options = IsolateOptions {
    output_dir: Some(ws.path("dist/foo")),
    include_dev_dependencies: false,
  };

  let result = isolate_workspace(&ws.path("apps/foo"), &options, &TarPacker)
    .await
    .unwrap();

  assert_eq!(result.output_dir, ws.path("dist/foo"));
  assert!(ws.path("dist/foo/workspaces/bar/index.js").is_file());
  assert!(!ws.path("apps/foo/isolate").exists());
}

#[tokio::test]
async fn dev_dependencies_are_followed_on_request() {
  let ws = TestWorkspace::new(&["apps/*", "libs/*"]);
  ws.write_file(
    "apps/foo/package.json",
    r#"{"name":"foo","devDependencies":{"fixtures":"workspace:*"}}"#,
  );
  ws.write_file("libs/fixtures/package.json", r#"{"name":"fixtures"}"#);

  let without = isolate_workspace(&ws.path("apps/foo"), &IsolateOptions::default(), &TarPacker)
    .await
    .unwrap();
  assert_eq!(without.packages, vec!["foo"]);
  let manifest = PackageManifest::load(&without.output_dir.join("package.json")).unwrap();
  assert!(manifest.dev_dependencies.unwrap().is_empty());

  let options = IsolateOptions {
    include_dev_dependencies: true,
    ..Default::default()
  };
  let with = isolate_workspace(&ws.path("apps/foo"), &options, &TarPacker)
    .await
    .unwrap();
  assert_eq!(with.packages, vec!["foo", "fixtures"]);
  let manifest = PackageManifest::load(&with.output_dir.join("package.json")).unwrap();
  assert_eq!(manifest.dev_dependencies.unwrap()["fixtures"], "file:./workspaces/fixtures");
}
