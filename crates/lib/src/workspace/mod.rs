//! pnpm workspace discovery and dependency resolution.

mod deps;
mod registry;
mod types;

pub use deps::find_internal_dependencies;
pub use registry::{
  RegistryError, WorkspaceRegistry, WorkspaceScan, build_workspace_registry, build_workspace_registry_excluding,
  find_workspace_root,
  read_workspace_config, scan_workspace,
};
pub use types::{
  DependencyMap, ManifestError, PackageManifest, SkipReason, SkippedCandidate, WORKSPACE_PROTOCOL, WorkspaceConfig,
  WorkspacePackage,
};
