//! Locked YAML index files
//!
//! Both indices share one on-disk format:
//!
//! ```yaml
//! builds:
//!   <key>:
//!     <payload fields>
//! format-version: "2"
//! ```
//!
//! Readers see either the previous or the next complete file: writes go to a
//! temp file in the same directory and are renamed over `index.yml`. Every
//! read-modify-write holds an exclusive advisory lock on `index.yml.lock`, so
//! one writer at a time per index, across threads and processes.

use crate::core::error::{IndexError, ReleaseError, ReleaseResult, ResultExt};
use fs4::fs_std::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::trace;

pub const INDEX_FILE: &str = "index.yml";
const LOCK_FILE: &str = "index.yml.lock";
const FORMAT_VERSION: &str = "2";

#[derive(Serialize, serde::Deserialize)]
#[serde(bound(deserialize = "P: DeserializeOwned"))]
struct IndexDocument<P> {
  #[serde(default = "BTreeMap::new")]
  builds: BTreeMap<String, P>,
  #[serde(rename = "format-version", default = "format_version")]
  format_version: String,
}

fn format_version() -> String {
  FORMAT_VERSION.to_string()
}

/// Exclusive hold on an index; released on drop
pub struct IndexLock {
  _file: File,
}

/// One `index.yml` with payloads of type `P`
pub struct IndexFile<P> {
  dir: PathBuf,
  _payload: PhantomData<fn() -> P>,
}

impl<P> IndexFile<P>
where
  P: Serialize + DeserializeOwned + Clone + PartialEq,
{
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      _payload: PhantomData,
    }
  }

  /// Path of `index.yml`
  pub fn path(&self) -> PathBuf {
    self.dir.join(INDEX_FILE)
  }

  fn corrupt(&self, reason: impl Into<String>) -> ReleaseError {
    ReleaseError::Index(IndexError::Corrupt {
      index: self.path(),
      reason: reason.into(),
    })
  }

  /// Read every entry; a missing file is an empty index
  pub fn load(&self) -> ReleaseResult<BTreeMap<String, P>> {
    let path = self.path();
    if !path.exists() {
      return Ok(BTreeMap::new());
    }
    let text = fs::read_to_string(&path).with_context(|| format!("Failed to read index {}", path.display()))?;
    if text.trim().is_empty() {
      return Ok(BTreeMap::new());
    }
    let doc: IndexDocument<P> = serde_yaml::from_str(&text).map_err(|e| self.corrupt(e.to_string()))?;
    Ok(doc.builds)
  }

  /// Read one entry
  pub fn get(&self, key: &str) -> ReleaseResult<Option<P>> {
    Ok(self.load()?.remove(key))
  }

  /// Take the index lock, creating the index directory if needed
  pub fn lock(&self) -> ReleaseResult<IndexLock> {
    fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create index directory {}", self.dir.display()))?;
    let lock_path = self.dir.join(LOCK_FILE);
    let file = OpenOptions::new()
      .create(true)
      .truncate(false)
      .read(true)
      .write(true)
      .open(&lock_path)
      .with_context(|| format!("Failed to open index lock {}", lock_path.display()))?;
    file
      .lock_exclusive()
      .with_context(|| format!("Failed to lock {}", lock_path.display()))?;
    trace!(lock = %lock_path.display(), "index locked");
    Ok(IndexLock { _file: file })
  }

  /// Run a read-modify-write under the index lock
  ///
  /// The closure sees the current entries; the file is rewritten only when
  /// the closure succeeds and changed something.
  pub fn update<R>(&self, f: impl FnOnce(&mut BTreeMap<String, P>) -> ReleaseResult<R>) -> ReleaseResult<R> {
    let _lock = self.lock()?;
    let before = self.load()?;
    let mut builds = before.clone();
    let result = f(&mut builds)?;
    if builds != before {
      self.save(&builds)?;
    }
    Ok(result)
  }

  /// Insert an entry once
  ///
  /// Returns `true` when the entry was written, `false` when an identical
  /// entry already existed. A different entry under the same key is an
  /// [`IndexError::Conflict`]; nothing is overwritten.
  #[cfg(test)]
  pub fn insert(&self, key: &str, payload: P) -> ReleaseResult<bool> {
    let index = self.path();
    self.update(|builds| match builds.get(key) {
      Some(existing) if *existing == payload => Ok(false),
      Some(_) => Err(ReleaseError::Index(IndexError::Conflict {
        index,
        key: key.to_string(),
      })),
      None => {
        builds.insert(key.to_string(), payload);
        Ok(true)
      }
    })
  }

  fn save(&self, builds: &BTreeMap<String, P>) -> ReleaseResult<()> {
    let doc = IndexDocument {
      builds: builds.clone(),
      format_version: format_version(),
    };
    let yaml = serde_yaml::to_string(&doc).context("Failed to serialize index")?;

    let mut tmp = NamedTempFile::new_in(&self.dir).context("Failed to create temporary index")?;
    tmp.write_all(yaml.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(self.path())?;
    trace!(index = %self.path().display(), entries = builds.len(), "index saved");
    Ok(())
  }
}
