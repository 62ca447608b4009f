//! fndeploy-lib: deploy fingerprints, planning and pnpm workspace isolation
//! for Cloud Functions codebases.
//!
//! - `cache`: per-endpoint hashes that let unchanged functions be skipped
//! - `plan`: create/update/delete/skip changesets between two backends
//! - `workspace`: pnpm workspace discovery and internal dependency resolution
//! - `isolate`: self-contained deploy bundles for a single workspace package

pub mod backend;
pub mod cache;
pub mod config;
pub mod consts;
pub mod isolate;
pub mod plan;
pub mod util;
pub mod workspace;
