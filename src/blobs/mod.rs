//! Working-tree blob tracking and the pre-finalize sync gate
//!
//! Large binary sources live under `blobs/` and are tracked in
//! `config/blobs.yml`:
//!
//! ```yaml
//! golang/go1.22.tar.gz:
//!   object_id: 6a1c0f9e-...
//!   sha: 2d7c...
//!   size: 68123456
//! ```
//!
//! A blob without an `object_id` was never uploaded. A release must not be
//! finalized while any blob is in that state, or differs from its record.

use crate::core::config::CONFIG_DIR;
use crate::core::error::{BlobError, ReleaseError, ReleaseResult, ResultExt};
use crate::utils::file_sha1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory holding local blob copies, relative to the repository root
pub const BLOBS_DIR: &str = "blobs";
const BLOBS_INDEX_FILE: &str = "blobs.yml";

/// Tracker of large files in the working tree
pub trait BlobTracker {
  /// Refresh the tracked state from disk
  fn sync(&mut self) -> ReleaseResult<()>;

  /// Whether any blob is not durably stored
  fn is_dirty(&self) -> bool;

  /// Paths of blobs that are not durably stored, sorted
  fn dirty_blobs(&self) -> Vec<String>;

  /// Print the dirty blobs for the user
  fn print_status(&self);
}

/// One tracked blob in `config/blobs.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRecord {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub object_id: Option<String>,
  pub sha: String,
  pub size: u64,
}

/// Why a blob counts as dirty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobState {
  /// Local file with no record
  New,
  /// Local file differs from its record
  Modified,
  /// Recorded, but never uploaded
  NotUploaded,
}

impl fmt::Display for BlobState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BlobState::New => write!(f, "new"),
      BlobState::Modified => write!(f, "modified"),
      BlobState::NotUploaded => write!(f, "not uploaded"),
    }
  }
}

/// `config/blobs.yml` plus the local `blobs/` directory
pub struct WorkingTreeBlobs {
  root: PathBuf,
  dirty: BTreeMap<String, BlobState>,
}

impl WorkingTreeBlobs {
  pub fn new(repo_root: impl Into<PathBuf>) -> Self {
    Self {
      root: repo_root.into(),
      dirty: BTreeMap::new(),
    }
  }

  fn index_path(&self) -> PathBuf {
    self.root.join(CONFIG_DIR).join(BLOBS_INDEX_FILE)
  }

  fn load_records(&self) -> ReleaseResult<BTreeMap<String, BlobRecord>> {
    let path = self.index_path();
    if !path.exists() {
      return Ok(BTreeMap::new());
    }
    let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    if text.trim().is_empty() {
      return Ok(BTreeMap::new());
    }
    serde_yaml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
  }

  /// Local blob files as `relative path → absolute path`
  fn local_files(&self) -> ReleaseResult<BTreeMap<String, PathBuf>> {
    let dir = self.root.join(BLOBS_DIR);
    let mut files = BTreeMap::new();
    if !dir.is_dir() {
      return Ok(files);
    }
    for entry in WalkDir::new(&dir).follow_links(true) {
      let entry = entry?;
      if !entry.file_type().is_file() {
        continue;
      }
      let rel = entry.path().strip_prefix(&dir)?;
      let key = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
      files.insert(key, entry.path().to_path_buf());
    }
    Ok(files)
  }
}

impl BlobTracker for WorkingTreeBlobs {
  fn sync(&mut self) -> ReleaseResult<()> {
    let records = self.load_records()?;
    let local = self.local_files()?;
    let mut dirty = BTreeMap::new();

    for (path, file) in &local {
      match records.get(path) {
        None => {
          dirty.insert(path.clone(), BlobState::New);
        }
        Some(record) => {
          let sha = file_sha1(file).with_context(|| format!("Failed to hash blob {}", file.display()))?;
          if sha != record.sha {
            dirty.insert(path.clone(), BlobState::Modified);
          } else if record.object_id.as_deref().is_none_or(str::is_empty) {
            dirty.insert(path.clone(), BlobState::NotUploaded);
          }
        }
      }
    }
    for (path, record) in &records {
      if !local.contains_key(path) && record.object_id.as_deref().is_none_or(str::is_empty) {
        dirty.insert(path.clone(), BlobState::NotUploaded);
      }
    }

    debug!(tracked = records.len(), local = local.len(), dirty = dirty.len(), "synced blobs");
    self.dirty = dirty;
    Ok(())
  }

  fn is_dirty(&self) -> bool {
    !self.dirty.is_empty()
  }

  fn dirty_blobs(&self) -> Vec<String> {
    self.dirty.keys().cloned().collect()
  }

  fn print_status(&self) {
    if self.dirty.is_empty() {
      println!("✅ All blobs are uploaded");
      return;
    }
    println!("📦 Blobs not uploaded ({}):", self.dirty.len());
    for (path, state) in &self.dirty {
      println!("   {} ({})", path, state);
    }
  }
}

/// Refuses to let a finalize proceed over unsynced blobs
pub struct BlobSyncGate;

impl BlobSyncGate {
  /// Sync the tracker and fail with the dirty paths if any remain
  pub fn check(tracker: &mut dyn BlobTracker) -> ReleaseResult<()> {
    tracker.sync()?;
    if tracker.is_dirty() {
      tracker.print_status();
      return Err(ReleaseError::Blobs(BlobError::Unsynced {
        paths: tracker.dirty_blobs(),
      }));
    }
    info!("blob sync gate passed");
    Ok(())
  }
}
