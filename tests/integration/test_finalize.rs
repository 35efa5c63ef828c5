//! Integration tests for `relfin finalize release`

use crate::helpers::{BLOBSTORE_DIR, DevTarball, TestRepo, relfin, run_relfin};
use anyhow::Result;
use tempfile::TempDir;

fn finalize(repo: &TestRepo, tarball: &DevTarball, extra: &[&str]) -> Result<std::process::Output> {
  let path = tarball.write_to(&repo.dev_dir)?;
  let path = path.to_string_lossy().to_string();
  let mut args = vec!["finalize", "release", path.as_str()];
  args.extend_from_slice(extra);
  relfin(&repo.path, &args)
}

#[test]
fn test_finalize_creates_final_release() -> Result<()> {
  let repo = TestRepo::new()?;
  let tarball = DevTarball::dummy().write_to(&repo.dev_dir)?;

  let output = run_relfin(&repo.path, &["finalize", "release", tarball.to_str().unwrap()])?;
  let stdout = String::from_utf8_lossy(&output.stdout);

  assert!(stdout.contains("Creating final release dummy/1 from dev release dummy/0.2-dev"), "{stdout}");
  assert!(stdout.contains("Finalized release dummy/1"), "{stdout}");
  assert!(stdout.contains("releases/dummy/dummy-1.yml"), "{stdout}");
  assert!(stdout.contains("3 uploaded, 0 already stored"), "{stdout}");

  assert!(repo.file_exists("releases/dummy/dummy-1.yml"));
  assert!(repo.file_exists("releases/dummy/dummy-1.tgz"));
  assert!(repo.file_exists("releases/dummy/index.yml"));
  assert_eq!(repo.blob_count()?, 3);

  let manifest: serde_yaml::Value = serde_yaml::from_str(&repo.read_file("releases/dummy/dummy-1.yml")?)?;
  assert_eq!(manifest["name"].as_str(), Some("dummy"));
  assert_eq!(manifest["version"].as_str(), Some("1"));
  assert_eq!(manifest["commit_hash"].as_str(), Some("abc1234"));

  let dev_config = repo.read_file("config/dev.toml")?;
  assert!(dev_config.contains("latest_release_filename = \"releases/dummy/dummy-1.yml\""));
  assert!(dev_config.contains("# local state"));
  Ok(())
}

#[test]
fn test_final_builds_index_records_fingerprints() -> Result<()> {
  let repo = TestRepo::new()?;
  let dev = DevTarball::dummy();
  assert!(finalize(&repo, &dev, &[])?.status.success());

  for (kind, name) in [("packages", "bar"), ("packages", "baz"), ("jobs", "foobar")] {
    let index: serde_yaml::Value =
      serde_yaml::from_str(&repo.read_file(&format!(".final_builds/{}/{}/index.yml", kind, name))?)?;
    assert_eq!(index["format-version"].as_str(), Some("2"));

    let builds = index["builds"].as_mapping().expect("builds map");
    assert_eq!(builds.len(), 1);

    let fingerprint = dev.fingerprint(name).unwrap();
    let entry = &index["builds"][fingerprint.as_str()];
    assert_eq!(entry["version"].as_str(), Some(fingerprint.as_str()));
    assert_eq!(entry["sha1"].as_str().map(str::len), Some(40));

    let blobstore_id = entry["blobstore_id"].as_str().unwrap();
    assert!(repo.file_exists(&format!("{}/{}", BLOBSTORE_DIR, blobstore_id)));
  }
  Ok(())
}

#[test]
fn test_dry_run_writes_nothing() -> Result<()> {
  let repo = TestRepo::new()?;
  let output = finalize(&repo, &DevTarball::dummy(), &["--dry-run"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);

  assert!(output.status.success());
  assert!(stdout.contains("Dry run: dummy/0.2-dev would become final release dummy/1"), "{stdout}");
  assert!(!repo.file_exists("releases"));
  assert!(!repo.file_exists(".final_builds"));
  assert_eq!(repo.blob_count()?, 0);
  assert!(!repo.read_file("config/dev.toml")?.contains("latest_release_filename"));
  Ok(())
}

#[test]
fn test_requested_version_conflict() -> Result<()> {
  let repo = TestRepo::new()?;
  assert!(finalize(&repo, &DevTarball::dummy(), &[])?.status.success());

  let output = finalize(&repo, &DevTarball::dummy().with_version("0.3-dev"), &["--version", "1"])?;
  let stderr = String::from_utf8_lossy(&output.stderr);

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr.contains("Release version already exists: dummy/1"), "{stderr}");
  assert_eq!(repo.blob_count()?, 3);
  Ok(())
}

#[test]
fn test_requested_version() -> Result<()> {
  let repo = TestRepo::new()?;
  let output = finalize(&repo, &DevTarball::dummy(), &["--version", "5", "--name", "renamed"])?;

  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
  assert!(repo.file_exists("releases/renamed/renamed-5.yml"));
  assert!(repo.file_exists("releases/renamed/renamed-5.tgz"));
  Ok(())
}

#[test]
fn test_unsynced_blobs_block_finalize() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write_file("blobs/golang/go1.22.tar.gz", b"not uploaded yet")?;

  let output = finalize(&repo, &DevTarball::dummy(), &[])?;
  let stderr = String::from_utf8_lossy(&output.stderr);

  assert_eq!(output.status.code(), Some(3));
  assert!(stderr.contains("golang/go1.22.tar.gz"), "{stderr}");
  assert!(!repo.file_exists("releases"));
  assert_eq!(repo.blob_count()?, 0);
  Ok(())
}

#[test]
fn test_refinalize_uploads_nothing_new() -> Result<()> {
  let repo = TestRepo::new()?;
  assert!(finalize(&repo, &DevTarball::dummy(), &[])?.status.success());
  let first = repo.read_file(".final_builds/packages/bar/index.yml")?;

  let output = finalize(&repo, &DevTarball::dummy().with_version("0.3-dev"), &[])?;
  let stdout = String::from_utf8_lossy(&output.stdout);

  assert!(output.status.success());
  assert!(stdout.contains("Finalized release dummy/2"), "{stdout}");
  assert!(stdout.contains("0 uploaded, 3 already stored"), "{stdout}");
  assert_eq!(repo.blob_count()?, 3);
  assert_eq!(repo.read_file(".final_builds/packages/bar/index.yml")?, first);
  Ok(())
}

#[test]
fn test_json_report() -> Result<()> {
  let repo = TestRepo::new()?;
  let output = finalize(&repo, &DevTarball::dummy(), &["--json"])?;
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(report["final_name"], "dummy");
  assert_eq!(report["final_version"], "1");
  assert_eq!(report["dry_run"], false);
  assert!(report["tarball_size"].as_u64().unwrap() > 0);

  let uploads = report["uploads"].as_array().unwrap();
  assert_eq!(uploads.len(), 3);
  assert_eq!(uploads[0]["kind"], "packages");
  assert_eq!(uploads[2]["kind"], "jobs");
  assert_eq!(uploads[2]["name"], "foobar");
  Ok(())
}

#[test]
fn test_already_final_tarball() -> Result<()> {
  let repo = TestRepo::new()?;
  let output = finalize(&repo, &DevTarball::dummy().with_version("2"), &[])?;
  let stderr = String::from_utf8_lossy(&output.stderr);

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr.contains("Release tarball already has final version 2"), "{stderr}");
  Ok(())
}

#[test]
fn test_missing_tarball() -> Result<()> {
  let repo = TestRepo::new()?;
  let output = relfin(&repo.path, &["finalize", "release", "nope.tgz"])?;
  let stderr = String::from_utf8_lossy(&output.stderr);

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr.contains("Cannot find release tarball"), "{stderr}");
  Ok(())
}

#[test]
fn test_outside_release_repository() -> Result<()> {
  let dir = TempDir::new()?;
  let output = relfin(dir.path(), &["finalize", "release", "dummy.tgz"])?;
  let stderr = String::from_utf8_lossy(&output.stderr);

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr.contains("Not a release repository"), "{stderr}");
  Ok(())
}
