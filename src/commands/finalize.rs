//! `relfin finalize release` command
//!
//! Wires the on-disk collaborators of a release repository into a
//! [`Finalizer`] and prints the outcome.

use crate::blobs::WorkingTreeBlobs;
use crate::blobstore;
use crate::core::context::ReleaseRepo;
use crate::core::error::ReleaseResult;
use crate::finalize::{FinalizeOptions, FinalizeReport, Finalizer};
use crate::index::final_builds::FinalBuildsDir;
use crate::index::versions::ReleasesDir;
use crate::release::tarball::ReleaseTarball;
use crate::ui::progress::{ConsoleProgress, FinalizeObserver, Silent};
use crate::utils::human_size;
use std::path::Path;
use tracing::warn;

/// Run the finalize release command
pub fn run_finalize_release(
  repo: &ReleaseRepo,
  tarball: &Path,
  options: FinalizeOptions,
  json: bool,
) -> ReleaseResult<()> {
  let tarball = if tarball.is_absolute() {
    tarball.to_path_buf()
  } else {
    std::env::current_dir()?.join(tarball)
  };

  let store = blobstore::from_config(&repo.config.blobstore, &repo.root)?;
  let versions = ReleasesDir::new(repo.releases_dir());
  let content = FinalBuildsDir::new(&repo.root);
  let mut blobs = WorkingTreeBlobs::new(&repo.root);
  let console = ConsoleProgress::new();
  let observer: &dyn FinalizeObserver = if json { &Silent } else { &console };

  if !json {
    println!("🔍 Finalizing {}", tarball.display());
  }

  let mut source = ReleaseTarball::new(tarball);
  let mut finalizer = Finalizer::new(repo, &versions, &content, store.as_ref(), &mut blobs).with_observer(observer);
  let report = finalizer
    .finalize(&mut source, &options)
    .inspect_err(|err| warn!(stage = ?finalizer.stage(), error = %err, "finalize stopped"))?;

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_report(repo, &report);
  }
  Ok(())
}

fn print_report(repo: &ReleaseRepo, report: &FinalizeReport) {
  let dev = format!("{}/{}", report.dev_name, report.dev_version);
  let fin = format!("{}/{}", report.final_name, report.final_version);

  if report.dry_run {
    println!("🧪 Dry run: {} would become final release {}", dev, fin);
    println!("   Manifest: {}", repo.relative(&report.manifest_path));
    println!("   Tarball:  {}", repo.relative(&report.tarball_path));
    println!();
    println!("No files written. Run without --dry-run to finalize.");
    return;
  }

  println!();
  println!("✅ Finalized release {}", fin);
  println!("   Name:     {}", report.final_name);
  println!("   Version:  {}", report.final_version);
  println!("   Manifest: {}", repo.relative(&report.manifest_path));
  match report.tarball_size {
    Some(size) => println!(
      "   Tarball:  {} ({})",
      repo.relative(&report.tarball_path),
      human_size(size)
    ),
    None => println!("   Tarball:  {}", repo.relative(&report.tarball_path)),
  }

  let deduplicated = report.uploads.len() - report.uploaded();
  println!(
    "   Artifacts: {} uploaded, {} already stored",
    report.uploaded(),
    deduplicated
  );
  for upload in &report.uploads {
    let mark = if upload.deduplicated { "⏭️ " } else { "⬆️ " };
    println!("     {} {}/{} → {}", mark, upload.kind, upload.name, upload.blobstore_id);
  }
}
