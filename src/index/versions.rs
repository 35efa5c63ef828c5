//! Issued final versions of one release (`releases/<name>/index.yml`)
//!
//! Entries are keyed by a random UUID and only ever appended:
//!
//! ```yaml
//! builds:
//!   3c7e4a2e-...:
//!     version: "1"
//! format-version: "2"
//! ```

use crate::core::error::{IndexError, ReleaseError, ReleaseResult, VersionError};
use crate::index::file::IndexFile;
use crate::release::version::ReleaseVersion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Payload of a version index entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPayload {
  pub version: String,
}

/// Append-only record of the versions issued for one release name
pub trait VersionIndex {
  /// Highest issued version, if any
  fn latest_version(&self) -> ReleaseResult<Option<ReleaseVersion>>;

  /// Whether this exact version string was issued
  fn contains_version(&self, version: &str) -> ReleaseResult<bool>;

  /// Record a newly issued version
  ///
  /// Fails with a version conflict if the string is already present.
  fn add_version(&self, key: Uuid, version: &str) -> ReleaseResult<()>;
}

/// Opens the version index of a release name
pub trait VersionIndexes {
  fn open(&self, name: &str) -> Box<dyn VersionIndex>;
}

/// On-disk version index for one release
pub struct ReleaseVersionsIndex {
  name: String,
  file: IndexFile<VersionPayload>,
}

impl ReleaseVersionsIndex {
  /// Open the index stored in `dir` (normally `releases/<name>`)
  pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
    Self {
      name: name.into(),
      file: IndexFile::new(dir),
    }
  }

  /// Every issued version string, in no particular order
  pub fn version_strings(&self) -> ReleaseResult<Vec<String>> {
    Ok(self.file.load()?.into_values().map(|p| p.version).collect())
  }
}

impl VersionIndex for ReleaseVersionsIndex {
  fn latest_version(&self) -> ReleaseResult<Option<ReleaseVersion>> {
    let mut latest: Option<ReleaseVersion> = None;
    for version in self.version_strings()? {
      let parsed = ReleaseVersion::parse(&version).map_err(|e| {
        ReleaseError::Index(IndexError::Corrupt {
          index: self.file.path(),
          reason: e.to_string(),
        })
      })?;
      if latest.as_ref().is_none_or(|current| parsed > *current) {
        latest = Some(parsed);
      }
    }
    Ok(latest)
  }

  fn contains_version(&self, version: &str) -> ReleaseResult<bool> {
    Ok(self.version_strings()?.iter().any(|v| v == version))
  }

  fn add_version(&self, key: Uuid, version: &str) -> ReleaseResult<()> {
    let name = self.name.clone();
    self.file.update(|builds| {
      if builds.values().any(|p| p.version == version) {
        return Err(ReleaseError::Version(VersionError::Conflict {
          name,
          version: version.to_string(),
        }));
      }
      builds.insert(
        key.to_string(),
        VersionPayload {
          version: version.to_string(),
        },
      );
      Ok(())
    })?;
    info!(release = %self.name, version, %key, "recorded final version");
    Ok(())
  }
}

/// Version indices under `releases/`
pub struct ReleasesDir {
  dir: PathBuf,
}

impl ReleasesDir {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }
}

impl VersionIndexes for ReleasesDir {
  fn open(&self, name: &str) -> Box<dyn VersionIndex> {
    Box::new(ReleaseVersionsIndex::new(name, self.dir.join(name)))
  }
}
