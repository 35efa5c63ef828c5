//! Content-addressed index of uploaded artifacts
//!
//! One index per artifact kind and name, keyed by fingerprint. An entry means
//! the artifact with that fingerprint is durably stored in the blobstore under
//! `blobstore_id`, so the same content is never uploaded twice.
//!
//! Layout: `.final_builds/packages/<name>/index.yml`,
//! `.final_builds/jobs/<name>/index.yml` and `.final_builds/license/index.yml`.

use crate::core::error::{IndexError, ReleaseError, ReleaseResult};
use crate::index::file::IndexFile;
use crate::release::manifest::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding all final build indices, relative to the repository root
pub const FINAL_BUILDS_DIR: &str = ".final_builds";

/// Metadata of one stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalBuildEntry {
  pub version: String,
  pub sha1: String,
  pub blobstore_id: String,
}

/// Fingerprint → stored artifact map for one artifact
pub trait ContentIndex: Send + Sync {
  /// Where the index lives, for error reporting
  fn location(&self) -> PathBuf;

  /// Entry for a fingerprint, if the content was stored before
  fn get(&self, fingerprint: &str) -> ReleaseResult<Option<FinalBuildEntry>>;

  /// Record an entry; identical re-records are no-ops, differing ones fail
  #[cfg(test)]
  fn put(&self, fingerprint: &str, entry: &FinalBuildEntry) -> ReleaseResult<()>;

  /// Look up a fingerprint and, if absent, produce and record its entry
  ///
  /// Lookup, `store` and the record happen under one exclusive hold of the
  /// index, so concurrent callers racing on a new fingerprint run `store`
  /// once; the others observe the committed entry. Returns the entry and
  /// whether this call created it. Nothing is recorded if `store` fails.
  fn get_or_store(
    &self,
    fingerprint: &str,
    store: &mut dyn FnMut() -> ReleaseResult<FinalBuildEntry>,
  ) -> ReleaseResult<(FinalBuildEntry, bool)>;
}

/// Opens the content index of an artifact
pub trait ContentIndexes: Send + Sync {
  fn open(&self, kind: ArtifactKind, name: &str) -> Box<dyn ContentIndex>;
}

/// On-disk index under `.final_builds/`
pub struct FinalBuildsIndex {
  file: IndexFile<FinalBuildEntry>,
}

impl FinalBuildsIndex {
  pub fn new(repo_root: &Path, kind: ArtifactKind, name: &str) -> Self {
    Self {
      file: IndexFile::new(index_dir(repo_root, kind, name)),
    }
  }

  /// Path of the backing `index.yml`
  pub fn path(&self) -> PathBuf {
    self.file.path()
  }

  fn checked(&self, fingerprint: &str, entry: FinalBuildEntry) -> ReleaseResult<FinalBuildEntry> {
    if entry.blobstore_id.trim().is_empty() {
      return Err(ReleaseError::Index(IndexError::Corrupt {
        index: self.file.path(),
        reason: format!("entry '{}' has no blobstore_id", fingerprint),
      }));
    }
    Ok(entry)
  }
}

/// Directory of the index for one artifact
pub fn index_dir(repo_root: &Path, kind: ArtifactKind, name: &str) -> PathBuf {
  let base = repo_root.join(FINAL_BUILDS_DIR).join(kind.as_str());
  match kind {
    ArtifactKind::License => base,
    _ => base.join(name),
  }
}

impl ContentIndex for FinalBuildsIndex {
  fn location(&self) -> PathBuf {
    self.path()
  }

  fn get(&self, fingerprint: &str) -> ReleaseResult<Option<FinalBuildEntry>> {
    self
      .file
      .get(fingerprint)?
      .map(|entry| self.checked(fingerprint, entry))
      .transpose()
  }

  #[cfg(test)]
  fn put(&self, fingerprint: &str, entry: &FinalBuildEntry) -> ReleaseResult<()> {
    self.file.insert(fingerprint, entry.clone()).map(|_| ())
  }

  fn get_or_store(
    &self,
    fingerprint: &str,
    store: &mut dyn FnMut() -> ReleaseResult<FinalBuildEntry>,
  ) -> ReleaseResult<(FinalBuildEntry, bool)> {
    let (entry, created) = self.file.update(|builds| match builds.get(fingerprint) {
      Some(existing) => Ok((existing.clone(), false)),
      None => {
        let entry = self.checked(fingerprint, store()?)?;
        builds.insert(fingerprint.to_string(), entry.clone());
        Ok((entry, true))
      }
    })?;
    Ok((self.checked(fingerprint, entry)?, created))
  }
}

/// All final build indices of a repository
pub struct FinalBuildsDir {
  root: PathBuf,
}

impl FinalBuildsDir {
  pub fn new(repo_root: impl Into<PathBuf>) -> Self {
    Self { root: repo_root.into() }
  }
}

impl ContentIndexes for FinalBuildsDir {
  fn open(&self, kind: ArtifactKind, name: &str) -> Box<dyn ContentIndex> {
    Box::new(FinalBuildsIndex::new(&self.root, kind, name))
  }
}
