//! Isolate a workspace package into a self-contained deploy bundle.
//!
//! The target package is copied into the output directory. Each internal
//! dependency is packed with the package manager and unpacked under
//! `workspaces/<name>`, manifests are pointed at those copies with `file:`
//! specifiers and the workspace lockfile is pruned down to the packages that
//! made it into the bundle.
//!
//! Every run wipes the output directory first, so repeated runs over an
//! unchanged tree produce the same bundle.

mod copy;
mod lockfile;
mod manifest;
mod pack;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use lockfile::{LockfileError, PnpmLockfile, importers_to_keep};
pub use manifest::{file_specifier, rewrite_manifest};
pub use pack::{PackError, PackageManager, PnpmCli, unpack_tarball};

use crate::consts::{DEFAULT_ISOLATE_DIR, ISOLATED_WORKSPACES_DIR, LOCKFILE_FILENAME, MANIFEST_FILENAME, WORKSPACE_CONFIG_FILENAME};
use crate::workspace::{
  ManifestError, PackageManifest, RegistryError, WorkspaceConfig, WorkspacePackage, build_workspace_registry_excluding,
  find_internal_dependencies, find_workspace_root,
};

#[derive(Debug, Error)]
pub enum IsolateError {
  #[error("no pnpm-workspace.yaml found in {0} or any parent directory")]
  NoWorkspaceRoot(PathBuf),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error("{dir} is not a package of the workspace at {root}")]
  NotAPackage { dir: PathBuf, root: PathBuf },

  #[error("refusing to use {output} as output directory: wiping it would delete {protected}")]
  UnsafeOutputDir { output: PathBuf, protected: PathBuf },

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to pack {package}: {source}")]
  Pack {
    package: String,
    #[source]
    source: PackError,
  },

  #[error("failed to unpack {package}: {source}")]
  Unpack {
    package: String,
    #[source]
    source: PackError,
  },

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Lockfile(#[from] LockfileError),

  #[error("failed to serialize workspace config {path}: {source}")]
  WorkspaceConfig {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },
}

impl IsolateError {
  fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| IsolateError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct IsolateOptions {
  /// Where to write the bundle. Relative paths resolve against the source
  /// directory; defaults to `<source>/isolate`.
  pub output_dir: Option<PathBuf>,
  /// Follow `devDependencies` edges too.
  pub include_dev_dependencies: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolateResult {
  pub output_dir: PathBuf,
  /// The target first, then its internal dependencies.
  pub packages: Vec<String>,
}

/// Directory name for an isolated package: `@scope/name` becomes `scope-name`.
pub fn sanitize_package_name(name: &str) -> String {
  name.trim_start_matches('@').replace('/', "-")
}

/// Build a deploy bundle for the workspace package in `source_dir`.
pub async fn isolate_workspace(
  source_dir: &Path,
  options: &IsolateOptions,
  package_manager: &impl PackageManager,
) -> Result<IsolateResult, IsolateError> {
  let source_dir = dunce::canonicalize(source_dir).map_err(IsolateError::io(source_dir))?;

  let root = find_workspace_root(&source_dir).ok_or_else(|| IsolateError::NoWorkspaceRoot(source_dir.clone()))?;
  info!(root = %root.display(), "found workspace root");

  let output_dir = resolve_output_dir(&source_dir, options.output_dir.as_deref());
  check_output_dir(&output_dir, &[&source_dir, &root])?;

  // Bundles from earlier runs contain package manifests of their own
  let bundles = [output_dir.clone(), source_dir.join(DEFAULT_ISOLATE_DIR)];
  let registry = build_workspace_registry_excluding(&root, &bundles)?;
  let target = registry
    .find_by_dir(&source_dir)
    .ok_or_else(|| IsolateError::NotAPackage {
      dir: source_dir.clone(),
      root: root.clone(),
    })?;
  let dependencies = find_internal_dependencies(&target.name, &registry, options.include_dev_dependencies);
  info!(target = %target.name, dependencies = dependencies.len(), "resolved internal dependencies");

  stage_output(&source_dir, &output_dir)?;

  let mut locations: BTreeMap<String, PathBuf> = BTreeMap::new();
  locations.insert(target.name.clone(), output_dir.clone());

  let mut packed: Vec<&WorkspacePackage> = Vec::new();
  if !dependencies.is_empty() {
    let scratch = tempfile::Builder::new()
      .prefix("fndeploy-pack")
      .tempdir()
      .map_err(IsolateError::io(&output_dir))?;

    for name in &dependencies {
      let Some(package) = registry.get(name) else {
        continue;
      };
      let dest = output_dir
        .join(ISOLATED_WORKSPACES_DIR)
        .join(sanitize_package_name(name));
      pack_package(package_manager, package, &scratch.path().join(sanitize_package_name(name)), &dest).await?;
      locations.insert(name.clone(), dest);
      packed.push(package);
    }
  }

  let mut manifest_dirs = vec![output_dir.clone()];
  manifest_dirs.extend(packed.iter().filter_map(|p| locations.get(&p.name).cloned()));
  for dir in &manifest_dirs {
    rewrite_manifest_in(dir, &locations)?;
  }

  prune_lockfile(&root, &output_dir, target, &packed)?;

  if !packed.is_empty() {
    write_workspace_config(&output_dir)?;
  }

  let packages: Vec<String> = std::iter::once(target.name.clone())
    .chain(packed.iter().map(|p| p.name.clone()))
    .collect();
  info!(output = %output_dir.display(), packages = packages.len(), "isolated workspace package");

  Ok(IsolateResult { output_dir, packages })
}

fn resolve_output_dir(source_dir: &Path, requested: Option<&Path>) -> PathBuf {
  let path = match requested {
    Some(p) if p.is_absolute() => p.to_path_buf(),
    Some(p) => source_dir.join(p),
    None => source_dir.join(DEFAULT_ISOLATE_DIR),
  };
  absolutize(&path)
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
fn absolutize(path: &Path) -> PathBuf {
  if let Ok(canonical) = dunce::canonicalize(path) {
    return canonical;
  }
  match (path.parent(), path.file_name()) {
    (Some(parent), Some(name)) => absolutize(parent).join(name),
    _ => path.to_path_buf(),
  }
}

/// The output directory is wiped, so it must not be or contain a protected directory.
fn check_output_dir(output: &Path, protected: &[&Path]) -> Result<(), IsolateError> {
  for dir in protected {
    if dir.starts_with(output) {
      return Err(IsolateError::UnsafeOutputDir {
        output: output.to_path_buf(),
        protected: dir.to_path_buf(),
      });
    }
  }
  Ok(())
}

fn stage_output(source_dir: &Path, output_dir: &Path) -> Result<(), IsolateError> {
  if output_dir.exists() {
    debug!(path = %output_dir.display(), "removing previous output");
  }
  copy::remove_path(output_dir).map_err(IsolateError::io(output_dir))?;
  fs::create_dir_all(output_dir).map_err(IsolateError::io(output_dir))?;

  let exclude = [output_dir.to_path_buf(), source_dir.join(DEFAULT_ISOLATE_DIR)];
  let copied = copy::copy_tree(source_dir, output_dir, &exclude).map_err(IsolateError::io(source_dir))?;
  info!(files = copied, output = %output_dir.display(), "copied target package");
  Ok(())
}

async fn pack_package(
  package_manager: &impl PackageManager,
  package: &WorkspacePackage,
  scratch: &Path,
  dest: &Path,
) -> Result<(), IsolateError> {
  let tarball = package_manager
    .pack(&package.dir, scratch)
    .await
    .map_err(|source| IsolateError::Pack {
      package: package.name.clone(),
      source,
    })?;

  package_manager
    .unpack(&tarball, dest)
    .map_err(|source| IsolateError::Unpack {
      package: package.name.clone(),
      source,
    })?;

  fs::remove_file(&tarball).map_err(IsolateError::io(&tarball))?;
  info!(package = %package.name, dest = %dest.display(), "packed internal dependency");
  Ok(())
}

fn rewrite_manifest_in(dir: &Path, locations: &BTreeMap<String, PathBuf>) -> Result<(), IsolateError> {
  let path = dir.join(MANIFEST_FILENAME);
  let mut manifest = PackageManifest::load(&path)?;
  if rewrite_manifest(&mut manifest, dir, locations) > 0 {
    manifest.save(&path)?;
  }
  Ok(())
}

fn prune_lockfile(
  root: &Path,
  output_dir: &Path,
  target: &WorkspacePackage,
  packed: &[&WorkspacePackage],
) -> Result<(), IsolateError> {
  let Some(mut lockfile) = PnpmLockfile::load(&root.join(LOCKFILE_FILENAME))? else {
    debug!(root = %root.display(), "no lockfile, skipping pruning");
    return Ok(());
  };

  let keep = importers_to_keep(
    &target.root_relative_dir,
    packed.iter().map(|p| p.root_relative_dir.as_str()),
  );
  let removed = lockfile.retain_importers(&keep);
  debug!(kept = keep.len(), removed, "pruned lockfile importers");

  lockfile.save(&output_dir.join(LOCKFILE_FILENAME))?;
  Ok(())
}

fn write_workspace_config(output_dir: &Path) -> Result<(), IsolateError> {
  let path = output_dir.join(WORKSPACE_CONFIG_FILENAME);
  let config = WorkspaceConfig {
    packages: vec![format!("{ISOLATED_WORKSPACES_DIR}/*")],
  };
  let content = serde_yaml::to_string(&config).map_err(|source| IsolateError::WorkspaceConfig {
    path: path.clone(),
    source,
  })?;
  fs::write(&path, content).map_err(IsolateError::io(&path))
}
