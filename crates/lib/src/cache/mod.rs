//! Deploy fingerprints used to skip unchanged functions.

mod apply;
pub mod hash;

pub use apply::{SourceHashes, apply_backend_hashes};
pub use hash::{
  PinnedSecretVersions, SecretVersion, SecretVersions, endpoint_hash, environment_variables_hash, secrets_hash,
  source_hash,
};
