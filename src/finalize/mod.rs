//! Finalize a dev release into an immutable final release
//!
//! A run moves through these stages:
//!
//! ```text
//! Validating → Allocating → Gating → DryRunStop
//!                                  ↘ Committing → Done
//! ```
//!
//! Any stage may fail, which ends the run. Nothing persistent is written
//! before `Committing`, so failed checks and dry runs leave the repository
//! untouched. Within `Committing` the final manifest and the version record
//! are written before any upload, and an artifact only enters its content
//! index once the store holds it. A run interrupted during uploads can be
//! re-run: stored artifacts dedup on the second pass.

pub mod uploader;

use crate::blobs::{BlobSyncGate, BlobTracker};
use crate::blobstore::ArtifactStoreClient;
use crate::core::config;
use crate::core::context::ReleaseRepo;
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt, TarballError, VersionError};
use crate::index::final_builds::ContentIndexes;
use crate::index::versions::VersionIndexes;
use crate::release::allocator::VersionAllocator;
use crate::release::manifest::ReleaseManifest;
use crate::release::tarball::ArtifactSource;
use crate::release::version::ReleaseVersion;
use crate::ui::progress::{FinalizeObserver, Silent};
use crate::utils::is_plain_name;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

pub use uploader::{DedupUploader, UploadRecord};

/// Caller choices for one finalize run
#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
  /// Stop after all checks pass, writing nothing
  pub dry_run: bool,
  /// Final release name instead of the dev release's
  pub name_override: Option<String>,
  /// Final version instead of the next free one
  pub version_override: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeStage {
  Validating,
  Allocating,
  Gating,
  DryRunStop,
  Committing,
  Done,
}

/// Outcome of a finalize run
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeReport {
  pub dev_name: String,
  pub dev_version: String,
  pub final_name: String,
  pub final_version: String,
  pub manifest_path: PathBuf,
  pub tarball_path: PathBuf,
  /// Size of the final tarball; absent for dry runs
  pub tarball_size: Option<u64>,
  pub uploads: Vec<UploadRecord>,
  pub dry_run: bool,
}

impl FinalizeReport {
  /// Uploads that actually transferred content
  pub fn uploaded(&self) -> usize {
    self.uploads.iter().filter(|u| !u.deduplicated).count()
  }
}

/// Drives one finalize run over its collaborators
pub struct Finalizer<'a> {
  repo: &'a ReleaseRepo,
  versions: &'a dyn VersionIndexes,
  content: &'a dyn ContentIndexes,
  store: &'a dyn ArtifactStoreClient,
  blobs: &'a mut dyn BlobTracker,
  observer: &'a dyn FinalizeObserver,
  stage: FinalizeStage,
}

impl<'a> Finalizer<'a> {
  pub fn new(
    repo: &'a ReleaseRepo,
    versions: &'a dyn VersionIndexes,
    content: &'a dyn ContentIndexes,
    store: &'a dyn ArtifactStoreClient,
    blobs: &'a mut dyn BlobTracker,
  ) -> Self {
    Self {
      repo,
      versions,
      content,
      store,
      blobs,
      observer: &Silent,
      stage: FinalizeStage::Validating,
    }
  }

  pub fn with_observer(mut self, observer: &'a dyn FinalizeObserver) -> Self {
    self.observer = observer;
    self
  }

  /// Last stage entered; the failing stage after an error
  pub fn stage(&self) -> FinalizeStage {
    self.stage
  }

  fn enter(&mut self, stage: FinalizeStage) {
    debug!(?stage, "finalize stage");
    self.stage = stage;
  }

  pub fn finalize(
    &mut self,
    source: &mut dyn ArtifactSource,
    options: &FinalizeOptions,
  ) -> ReleaseResult<FinalizeReport> {
    self.enter(FinalizeStage::Validating);
    if !source.exists() {
      return Err(
        TarballError::NotFound {
          path: source.path().to_path_buf(),
        }
        .into(),
      );
    }
    source.validate()?;
    let manifest = ReleaseManifest::from_yaml(&source.manifest()?)?;
    let dev_version = source.version()?;
    let parsed = ReleaseVersion::parse(&dev_version).map_err(|err| TarballError::Invalid {
      path: source.path().to_path_buf(),
      reasons: vec![err.to_string()],
    })?;
    if !parsed.is_dev_build() {
      return Err(VersionError::AlreadyFinal { version: dev_version }.into());
    }

    self.enter(FinalizeStage::Allocating);
    let final_name = options
      .name_override
      .clone()
      .unwrap_or_else(|| manifest.name.clone());
    if final_name.trim().is_empty() {
      return Err(ReleaseError::with_help(
        "Final release name is empty",
        "Pass a non-empty --name, or omit it to keep the dev release name.",
      ));
    }
    if !is_plain_name(&final_name) {
      return Err(ReleaseError::with_help(
        format!("Final release name '{}' is not a plain name", final_name),
        "Release names cannot contain path separators or be '.' or '..'.",
      ));
    }
    let versions = self.versions.open(&final_name);
    let final_version = VersionAllocator::new(&final_name, versions.as_ref())
      .with_release_dir(&self.repo.release_dir(&final_name))
      .allocate(options.version_override.as_deref())?;

    self.enter(FinalizeStage::Gating);
    BlobSyncGate::check(&mut *self.blobs)?;

    let mut report = FinalizeReport {
      dev_name: manifest.name.clone(),
      dev_version,
      manifest_path: self.repo.final_manifest_path(&final_name, &final_version),
      tarball_path: self.repo.final_tarball_path(&final_name, &final_version),
      final_name,
      final_version,
      tarball_size: None,
      uploads: Vec::new(),
      dry_run: options.dry_run,
    };

    if options.dry_run {
      self.enter(FinalizeStage::DryRunStop);
      info!(release = %report.final_name, version = %report.final_version, "dry run, nothing written");
      return Ok(report);
    }

    self.enter(FinalizeStage::Committing);
    self.observer.committing(
      &format!("{}/{}", report.dev_name, report.dev_version),
      &format!("{}/{}", report.final_name, report.final_version),
    );

    let mut final_manifest = manifest;
    final_manifest.rename(&report.final_name, &report.final_version);
    source.replace_manifest(&final_manifest)?;

    let release_dir = self.repo.release_dir(&report.final_name);
    fs::create_dir_all(&release_dir).with_context(|| format!("Failed to create {}", release_dir.display()))?;
    write_final_manifest(&report, &final_manifest)?;

    versions.add_version(Uuid::new_v4(), &report.final_version)?;

    report.tarball_size = Some(source.create_from_unpacked(&report.tarball_path)?);
    report.uploads = self.upload_artifacts(&*source, &final_manifest)?;

    config::set_latest_release_filename(&self.repo.root, &self.repo.relative(&report.manifest_path))?;

    self.enter(FinalizeStage::Done);
    info!(
      release = %report.final_name,
      version = %report.final_version,
      uploaded = report.uploaded(),
      deduplicated = report.uploads.len() - report.uploaded(),
      "final release created"
    );
    Ok(report)
  }

  /// Store every artifact, packages then jobs then license
  ///
  /// Uploads run on a pool of `uploads.max_parallel` workers; records come
  /// back in manifest order. The first failure aborts the run.
  fn upload_artifacts(
    &self,
    source: &dyn ArtifactSource,
    manifest: &ReleaseManifest,
  ) -> ReleaseResult<Vec<UploadRecord>> {
    let work = manifest
      .artifacts()
      .into_iter()
      .map(|(kind, artifact)| -> ReleaseResult<_> {
        let tarball = source.artifact_tarball_path(kind, &artifact.name)?;
        Ok((kind, artifact, tarball))
      })
      .collect::<ReleaseResult<Vec<_>>>()?;

    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(self.repo.config.uploads.max_parallel)
      .build()?;
    let uploader = DedupUploader::new(self.store, self.content);
    let observer = self.observer;

    observer.uploads_started(work.len());
    pool.install(|| {
      work
        .par_iter()
        .map(|(kind, artifact, tarball)| -> ReleaseResult<UploadRecord> {
          let record = uploader.upload(*kind, artifact, tarball)?;
          observer.artifact_done();
          Ok(record)
        })
        .collect::<ReleaseResult<Vec<_>>>()
    })
  }
}

/// Write the final manifest, refusing to replace one another run wrote
fn write_final_manifest(report: &FinalizeReport, manifest: &ReleaseManifest) -> ReleaseResult<()> {
  let path = &report.manifest_path;
  let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
    Ok(file) => file,
    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
      return Err(
        VersionError::Conflict {
          name: report.final_name.clone(),
          version: report.final_version.clone(),
        }
        .into(),
      );
    }
    Err(e) => return Err(ReleaseError::from(e).context(format!("Failed to create {}", path.display()))),
  };
  file
    .write_all(manifest.to_yaml()?.as_bytes())
    .and_then(|()| file.sync_all())
    .with_context(|| format!("Failed to write {}", path.display()))
}
