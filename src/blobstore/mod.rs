//! Artifact stores for finalized release content
//!
//! The finalize engine only needs one operation from a store: take a stream
//! of bytes and hand back an opaque id under which the bytes now durably
//! live. Providers are picked by `[blobstore] provider` in `config/final.toml`.

use crate::core::config::BlobstoreConfig;
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// Provider name of [`LocalBlobstore`]
pub const LOCAL_PROVIDER: &str = "local";

/// Durable storage for artifact tarballs
pub trait ArtifactStoreClient: Send + Sync {
  /// Store the full content of `reader`, returning the new object id
  ///
  /// The id is only returned once the content is durable.
  fn create(&self, reader: &mut dyn Read) -> ReleaseResult<String>;
}

/// Blobstore backed by a local directory, one file per object
pub struct LocalBlobstore {
  dir: PathBuf,
}

impl LocalBlobstore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  /// Location of an object
  pub fn object_path(&self, id: &str) -> PathBuf {
    self.dir.join(id)
  }
}

impl ArtifactStoreClient for LocalBlobstore {
  fn create(&self, reader: &mut dyn Read) -> ReleaseResult<String> {
    fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create blobstore {}", self.dir.display()))?;

    let id = Uuid::new_v4().to_string();
    let mut tmp = NamedTempFile::new_in(&self.dir).context("Failed to create temporary blob")?;
    let bytes = io::copy(reader, &mut tmp).context("Failed to write blob")?;
    tmp.as_file().sync_all()?;
    tmp.persist(self.object_path(&id))?;

    debug!(blobstore = %self.dir.display(), %id, bytes, "stored blob");
    Ok(id)
  }
}

/// Build the store configured for a repository
///
/// Relative `blobstore_path` values resolve against the repository root.
pub fn from_config(config: &BlobstoreConfig, repo_root: &Path) -> ReleaseResult<Box<dyn ArtifactStoreClient>> {
  match config.provider.as_str() {
    LOCAL_PROVIDER => {
      let path = Path::new(config.require_option("blobstore_path")?);
      let dir = if path.is_absolute() {
        path.to_path_buf()
      } else {
        repo_root.join(path)
      };
      Ok(Box::new(LocalBlobstore::new(dir)))
    }
    other => Err(ReleaseError::Config(ConfigError::UnsupportedProvider {
      provider: other.to_string(),
    })),
  }
}
