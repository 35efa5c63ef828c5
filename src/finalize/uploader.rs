//! Deduplicating artifact uploads
//!
//! The fingerprint of an artifact is its dedup key. If the artifact's
//! content index already has the fingerprint, the content is stored and the
//! upload is skipped. Otherwise the lookup is repeated under the index lock,
//! and on a miss the tarball is streamed to the store and the returned id
//! recorded before the lock is released, so racing runs upload a new
//! fingerprint once.

use crate::blobstore::ArtifactStoreClient;
use crate::core::error::{ArtifactError, IndexError, ReleaseError, ReleaseResult, ResultExt};
use crate::index::final_builds::{ContentIndexes, FinalBuildEntry};
use crate::release::manifest::{Artifact, ArtifactKind};
use crate::utils::file_sha1;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Where one artifact of a finalized release is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
  pub kind: ArtifactKind,
  pub name: String,
  pub fingerprint: String,
  pub blobstore_id: String,
  /// Content was already stored; nothing was uploaded
  pub deduplicated: bool,
}

/// Display name of an artifact; the license has none of its own
pub fn artifact_name(kind: ArtifactKind, artifact: &Artifact) -> String {
  if artifact.name.is_empty() {
    kind.to_string()
  } else {
    artifact.name.clone()
  }
}

pub struct DedupUploader<'a> {
  store: &'a dyn ArtifactStoreClient,
  indexes: &'a dyn ContentIndexes,
}

impl<'a> DedupUploader<'a> {
  pub fn new(store: &'a dyn ArtifactStoreClient, indexes: &'a dyn ContentIndexes) -> Self {
    Self { store, indexes }
  }

  /// Ensure `artifact` is stored, uploading `tarball` only for new content
  pub fn upload(&self, kind: ArtifactKind, artifact: &Artifact, tarball: &Path) -> ReleaseResult<UploadRecord> {
    let name = artifact_name(kind, artifact);
    let fingerprint = artifact.fingerprint().ok_or_else(|| {
      ReleaseError::Artifact(ArtifactError::MissingFingerprint {
        kind: kind.to_string(),
        name: name.clone(),
      })
    })?;

    let index = self.indexes.open(kind, &artifact.name);
    let upload_failed = |reason: String| {
      ReleaseError::Artifact(ArtifactError::UploadFailed {
        kind: kind.to_string(),
        name: name.clone(),
        reason,
      })
    };

    let stored = match index.get(fingerprint)? {
      Some(entry) => (entry, false),
      None => index.get_or_store(fingerprint, &mut || {
      let sha1 = if artifact.sha1.is_empty() {
        file_sha1(tarball).with_context(|| format!("Failed to hash {}", tarball.display()))?
      } else {
        artifact.sha1.clone()
      };
      let mut file = File::open(tarball).map_err(|e| upload_failed(format!("{}: {}", tarball.display(), e)))?;
      let blobstore_id = self.store.create(&mut file).map_err(|e| upload_failed(e.to_string()))?;
      debug!(%kind, artifact = %name, fingerprint, %blobstore_id, "uploaded artifact");
      Ok(FinalBuildEntry {
        version: artifact.version.clone(),
        sha1,
        blobstore_id,
      })
    })?,
    };
    let (entry, created) = stored;

    if !created && entry.version != artifact.version {
      return Err(ReleaseError::Index(IndexError::Conflict {
        index: index.location(),
        key: fingerprint.to_string(),
      }));
    }

    if !created {
      info!(%kind, artifact = %name, fingerprint, blobstore_id = %entry.blobstore_id, "artifact already stored");
    }

    Ok(UploadRecord {
      kind,
      name,
      fingerprint: fingerprint.to_string(),
      blobstore_id: entry.blobstore_id,
      deduplicated: !created,
    })
  }
}
