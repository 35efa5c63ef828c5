//! Release repository context - build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   ReleaseRepo::build() -> &ReleaseRepo
//!   |
//!   v
//! commands/finalize.rs:
//!   fn run_finalize_release(repo: &ReleaseRepo, ...)
//! ```

use crate::core::config::{CONFIG_DIR, FinalConfig};
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult};
use crate::utils::display_relative;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory of final releases, relative to the repository root
pub const RELEASES_DIR: &str = "releases";

const REQUIRED_DIRS: [&str; 3] = [CONFIG_DIR, "jobs", "packages"];

/// A release repository and its committed configuration
#[derive(Clone)]
pub struct ReleaseRepo {
  /// Repository root directory
  pub root: PathBuf,

  /// `config/final.toml`
  pub config: Arc<FinalConfig>,
}

impl ReleaseRepo {
  /// Open the release repository rooted at `root`
  ///
  /// Fails when `root` lacks the release directory layout or
  /// `config/final.toml`.
  pub fn build(root: &Path) -> ReleaseResult<Self> {
    if !Self::is_release_dir(root) {
      return Err(ReleaseError::Config(ConfigError::NotReleaseDir {
        path: root.to_path_buf(),
      }));
    }
    let config = FinalConfig::load(root)?;
    Ok(Self::new(root, config))
  }

  pub fn new(root: &Path, config: FinalConfig) -> Self {
    Self {
      root: root.to_path_buf(),
      config: Arc::new(config),
    }
  }

  /// Whether `root` has the directories of a release repository
  pub fn is_release_dir(root: &Path) -> bool {
    REQUIRED_DIRS.iter().all(|dir| root.join(dir).is_dir())
  }

  /// `releases/`
  pub fn releases_dir(&self) -> PathBuf {
    self.root.join(RELEASES_DIR)
  }

  /// `releases/<name>/`, home of a release's version index and final files
  pub fn release_dir(&self, name: &str) -> PathBuf {
    self.releases_dir().join(name)
  }

  /// `releases/<name>/<name>-<version>.yml`
  pub fn final_manifest_path(&self, name: &str, version: &str) -> PathBuf {
    self.release_dir(name).join(format!("{}-{}.yml", name, version))
  }

  /// `releases/<name>/<name>-<version>.tgz`
  pub fn final_tarball_path(&self, name: &str, version: &str) -> PathBuf {
    self.release_dir(name).join(format!("{}-{}.tgz", name, version))
  }

  /// Path relative to the repository root, `/`-separated
  pub fn relative(&self, path: &Path) -> String {
    display_relative(&self.root, path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::{BlobstoreConfig, UploadConfig};
  use std::collections::BTreeMap;
  use std::fs;
  use tempfile::TempDir;

  fn config() -> FinalConfig {
    FinalConfig {
      blobstore: BlobstoreConfig {
        provider: "local".to_string(),
        options: BTreeMap::new(),
      },
      uploads: UploadConfig::default(),
    }
  }

  #[test]
  fn test_final_paths() {
    let repo = ReleaseRepo::new(Path::new("/repo"), config());
    assert_eq!(
      repo.final_manifest_path("dummy", "1"),
      PathBuf::from("/repo/releases/dummy/dummy-1.yml")
    );
    assert_eq!(
      repo.final_tarball_path("dummy", "1"),
      PathBuf::from("/repo/releases/dummy/dummy-1.tgz")
    );
    assert_eq!(
      repo.relative(&repo.final_manifest_path("dummy", "1")),
      "releases/dummy/dummy-1.yml"
    );
  }

  #[test]
  fn test_build_requires_release_layout() {
    let tmp = TempDir::new().unwrap();
    let err = ReleaseRepo::build(tmp.path()).err().unwrap();
    assert!(matches!(err, ReleaseError::Config(ConfigError::NotReleaseDir { .. })));

    for dir in REQUIRED_DIRS {
      fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }
    let err = ReleaseRepo::build(tmp.path()).err().unwrap();
    assert!(matches!(err, ReleaseError::Config(ConfigError::NotFound { .. })));

    fs::write(
      FinalConfig::path(tmp.path()),
      "[blobstore]\nprovider = \"local\"\n[blobstore.options]\nblobstore_path = \"blobs\"\n",
    )
    .unwrap();
    let repo = ReleaseRepo::build(tmp.path()).unwrap();
    assert_eq!(repo.config.uploads.max_parallel, 4);
  }
}
