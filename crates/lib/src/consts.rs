
/// Workspace configuration file that marks a pnpm monorepo root.
pub const WORKSPACE_CONFIG_FILENAME: &str = "pnpm-workspace.yaml";

/// Package manifest file name.
pub const MANIFEST_FILENAME: &str = "package.json";

/// Lock file written by pnpm at the workspace root.
pub const LOCKFILE_FILENAME: &str = "pnpm-lock.yaml";

/// Directory inside an isolated bundle that holds the packed internal dependencies.
pub const ISOLATED_WORKSPACES_DIR: &str = "workspaces";

/// Default name of the isolated output directory, relative to the target package.
pub const DEFAULT_ISOLATE_DIR: &str = "isolate";

/// Directories never entered while scanning or copying a workspace.
pub const IGNORED_DIRS: &[&str] = &["node_modules", ".git"];

/// Codebase assigned to endpoints that don't declare one.
pub const DEFAULT_CODEBASE: &str = "default";

/// Label set on every function the CLI deploys.
pub const DEPLOYMENT_TOOL_LABEL: &str = "deployment-tool";

/// Prefix of the `deployment-tool` label value on firebase-managed functions.
pub const FIREBASE_MANAGED_PREFIX: &str = "cli-firebase";

/// Event type of v2 functions triggered by Pub/Sub messages.
pub const PUBSUB_PUBLISH_EVENT: &str = "google.cloud.pubsub.topic.v1.messagePublished";
