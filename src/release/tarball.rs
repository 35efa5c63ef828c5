//! Dev release tarballs
//!
//! A release tarball is a gzip tar with this layout:
//!
//! ```text
//! ./release.MF              manifest (YAML)
//! ./packages/<name>.tgz     one tarball per package
//! ./jobs/<name>.tgz         one tarball per job
//! ./license.tgz             optional
//! ```
//!
//! [`ReleaseTarball`] unpacks into a private temp dir on validation. The
//! manifest can be replaced in the unpacked tree and the tree packed again
//! into the final release tarball.

use crate::core::error::{ReleaseError, ReleaseResult, ResultExt, TarballError};
use crate::release::manifest::{ArtifactKind, ReleaseManifest};
use crate::utils::{file_sha1, is_plain_name};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

/// Manifest file name inside a release tarball
pub const MANIFEST_FILE: &str = "release.MF";

/// Source of a release and its artifact tarballs
///
/// The finalize engine only talks to release content through this trait.
pub trait ArtifactSource {
  /// Where the source lives
  fn path(&self) -> &Path;

  /// Whether the source exists at all
  fn exists(&self) -> bool;

  /// Structural validation; must succeed before any other accessor is used
  fn validate(&mut self) -> ReleaseResult<()>;

  /// Version recorded in the source manifest
  fn version(&self) -> ReleaseResult<String>;

  /// Raw manifest document
  fn manifest(&self) -> ReleaseResult<String>;

  /// Replace the manifest of the unpacked release
  fn replace_manifest(&mut self, manifest: &ReleaseManifest) -> ReleaseResult<()>;

  /// Pack the unpacked release into `dest`, returning the size in bytes
  fn create_from_unpacked(&self, dest: &Path) -> ReleaseResult<u64>;

  /// Location of an artifact tarball inside the unpacked release
  fn artifact_tarball_path(&self, kind: ArtifactKind, name: &str) -> ReleaseResult<PathBuf>;
}

/// Gzip tar release on local disk
pub struct ReleaseTarball {
  path: PathBuf,
  unpacked: Option<TempDir>,
}

impl ReleaseTarball {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      unpacked: None,
    }
  }

  fn unpacked_dir(&self) -> ReleaseResult<&Path> {
    self.unpacked.as_ref().map(TempDir::path).ok_or_else(|| {
      ReleaseError::message(format!(
        "Release tarball {} has not been validated",
        self.path.display()
      ))
    })
  }

  fn invalid(&self, reasons: Vec<String>) -> ReleaseError {
    ReleaseError::Tarball(TarballError::Invalid {
      path: self.path.clone(),
      reasons,
    })
  }

  fn unpack(&self) -> ReleaseResult<TempDir> {
    let dir = TempDir::new().context("Failed to create unpack directory")?;
    let file = File::open(&self.path).with_context(|| format!("Failed to open {}", self.path.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
      .unpack(dir.path())
      .map_err(|e| self.invalid(vec![format!("cannot unpack: {}", e)]))?;
    debug!(tarball = %self.path.display(), dir = %dir.path().display(), "unpacked release tarball");
    Ok(dir)
  }

  fn check_contents(&self, root: &Path) -> Vec<String> {
    let manifest_path = root.join(MANIFEST_FILE);
    let text = match fs::read_to_string(&manifest_path) {
      Ok(text) => text,
      Err(_) => return vec![format!("missing {}", MANIFEST_FILE)],
    };
    let manifest = match ReleaseManifest::from_yaml(&text) {
      Ok(manifest) => manifest,
      Err(e) => return vec![format!("unreadable {}: {}", MANIFEST_FILE, e)],
    };

    let mut reasons = Vec::new();
    if manifest.name.trim().is_empty() {
      reasons.push("manifest has no release name".to_string());
    } else if !is_plain_name(&manifest.name) {
      reasons.push(format!("release name '{}' is not a plain name", manifest.name));
    }
    if manifest.version.trim().is_empty() {
      reasons.push("manifest has no release version".to_string());
    }

    for (kind, artifact) in manifest.artifacts() {
      let label = match kind {
        ArtifactKind::License => kind.to_string(),
        _ => format!("{}/{}", kind, artifact.name),
      };
      if kind != ArtifactKind::License && artifact.name.trim().is_empty() {
        reasons.push(format!("{} entry without a name", kind));
        continue;
      }
      if kind != ArtifactKind::License && !is_plain_name(&artifact.name) {
        reasons.push(format!("{} name is not a plain name", label));
        continue;
      }
      let tarball = tarball_path_in(root, kind, &artifact.name);
      if !tarball.is_file() {
        reasons.push(format!("{} is missing its tarball", label));
        continue;
      }
      if artifact.sha1.is_empty() {
        continue;
      }
      match file_sha1(&tarball) {
        Ok(actual) if actual == artifact.sha1 => {}
        Ok(actual) => reasons.push(format!(
          "{} checksum mismatch (expected {}, got {})",
          label, artifact.sha1, actual
        )),
        Err(e) => reasons.push(format!("{} cannot be read: {}", label, e)),
      }
    }
    reasons
  }
}

fn tarball_path_in(root: &Path, kind: ArtifactKind, name: &str) -> PathBuf {
  match kind {
    ArtifactKind::License => root.join("license.tgz"),
    _ => root.join(kind.as_str()).join(format!("{}.tgz", name)),
  }
}

impl ArtifactSource for ReleaseTarball {
  fn path(&self) -> &Path {
    &self.path
  }

  fn exists(&self) -> bool {
    self.path.is_file()
  }

  fn validate(&mut self) -> ReleaseResult<()> {
    if !self.exists() {
      return Err(ReleaseError::Tarball(TarballError::NotFound {
        path: self.path.clone(),
      }));
    }

    let dir = self.unpack()?;
    let reasons = self.check_contents(dir.path());
    if !reasons.is_empty() {
      return Err(self.invalid(reasons));
    }
    self.unpacked = Some(dir);
    Ok(())
  }

  fn version(&self) -> ReleaseResult<String> {
    Ok(ReleaseManifest::from_yaml(&self.manifest()?)?.version)
  }

  fn manifest(&self) -> ReleaseResult<String> {
    let path = self.unpacked_dir()?.join(MANIFEST_FILE);
    fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
  }

  fn replace_manifest(&mut self, manifest: &ReleaseManifest) -> ReleaseResult<()> {
    let path = self.unpacked_dir()?.join(MANIFEST_FILE);
    fs::write(&path, manifest.to_yaml()?).with_context(|| format!("Failed to write {}", path.display()))
  }

  fn create_from_unpacked(&self, dest: &Path) -> ReleaseResult<u64> {
    let root = self.unpacked_dir()?;
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;

    let tmp = NamedTempFile::new_in(parent).context("Failed to create temporary tarball")?;
    let encoder = GzEncoder::new(tmp.reopen()?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder
      .append_dir_all(".", root)
      .with_context(|| format!("Failed to pack {}", dest.display()))?;
    let encoder = builder.into_inner()?;
    encoder.finish()?.sync_all()?;

    tmp
      .persist_noclobber(dest)
      .with_context(|| format!("Failed to write {}", dest.display()))?;
    let size = fs::metadata(dest)?.len();
    debug!(tarball = %dest.display(), size, "packed release tarball");
    Ok(size)
  }

  fn artifact_tarball_path(&self, kind: ArtifactKind, name: &str) -> ReleaseResult<PathBuf> {
    Ok(tarball_path_in(self.unpacked_dir()?, kind, name))
  }
}
