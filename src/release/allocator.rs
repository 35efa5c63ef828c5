//! Final version allocation
//!
//! Allocation is a pure read: nothing is recorded until the finalize run
//! commits the version to the index.

use crate::core::error::{ReleaseResult, VersionError};
use crate::index::versions::VersionIndex;
use crate::release::version::ReleaseVersion;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct VersionAllocator<'a> {
  name: &'a str,
  index: &'a dyn VersionIndex,
  release_dir: Option<PathBuf>,
}

impl<'a> VersionAllocator<'a> {
  pub fn new(name: &'a str, index: &'a dyn VersionIndex) -> Self {
    Self {
      name,
      index,
      release_dir: None,
    }
  }

  /// Also treat versions with a final manifest in `dir` as taken
  pub fn with_release_dir(mut self, dir: &Path) -> Self {
    self.release_dir = Some(dir.to_path_buf());
    self
  }

  /// Whether a version string was already issued for this release
  pub fn is_taken(&self, version: &str) -> ReleaseResult<bool> {
    if self.index.contains_version(version)? {
      return Ok(true);
    }
    Ok(
      self
        .release_dir
        .as_ref()
        .is_some_and(|dir| dir.join(format!("{}-{}.yml", self.name, version)).exists()),
    )
  }

  /// Resolve the final version: the requested one if free, else the next one
  pub fn allocate(&self, requested: Option<&str>) -> ReleaseResult<String> {
    let version = match requested {
      Some(requested) => {
        ReleaseVersion::parse(requested)?;
        requested.trim().to_string()
      }
      None => {
        let latest = self.index.latest_version()?.unwrap_or_else(ReleaseVersion::zero);
        latest.increment_release().to_string()
      }
    };

    if self.is_taken(&version)? {
      return Err(
        VersionError::Conflict {
          name: self.name.to_string(),
          version,
        }
        .into(),
      );
    }

    debug!(release = self.name, %version, requested = requested.is_some(), "allocated final version");
    Ok(version)
  }
}
