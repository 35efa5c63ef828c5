//! Test helpers for integration tests

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Blobstore directory of a test repo, relative to its root
pub const BLOBSTORE_DIR: &str = "tmp/blobstore";

/// A scratch release repository with a local blobstore
pub struct TestRepo {
  _root: TempDir,
  _dev: TempDir,
  pub path: PathBuf,
  /// Where dev tarballs are written, outside the repository
  pub dev_dir: PathBuf,
}

impl TestRepo {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let dev = TempDir::new()?;
    let path = root.path().to_path_buf();

    for dir in ["config", "jobs", "packages"] {
      fs::create_dir_all(path.join(dir))?;
    }
    fs::write(
      path.join("config/final.toml"),
      format!(
        r#"[blobstore]
provider = "local"

[blobstore.options]
blobstore_path = "{}"

[uploads]
max_parallel = 2
"#,
        BLOBSTORE_DIR
      ),
    )?;
    fs::write(path.join("config/dev.toml"), "# local state\ndev_name = \"dummy\"\n")?;

    Ok(Self {
      dev_dir: dev.path().to_path_buf(),
      _root: root,
      _dev: dev,
      path,
    })
  }

  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  pub fn read_file(&self, path: &str) -> Result<String> {
    fs::read_to_string(self.path.join(path)).with_context(|| format!("Failed to read {}", path))
  }

  pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
    let full = self.path.join(path);
    if let Some(parent) = full.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(full, content)?;
    Ok(())
  }

  /// Number of objects in the local blobstore
  pub fn blob_count(&self) -> Result<usize> {
    let dir = self.path.join(BLOBSTORE_DIR);
    if !dir.exists() {
      return Ok(0);
    }
    Ok(fs::read_dir(dir)?.count())
  }
}

/// A dev release tarball as produced by `create release`
pub struct DevTarball {
  pub name: String,
  pub version: String,
  /// `(kind, name, content)`; kind is `packages`, `jobs` or `license`
  pub artifacts: Vec<(&'static str, String, Vec<u8>)>,
}

impl DevTarball {
  /// `dummy/0.2-dev` with packages `bar`, `baz` and job `foobar`
  pub fn dummy() -> Self {
    Self {
      name: "dummy".to_string(),
      version: "0.2-dev".to_string(),
      artifacts: vec![
        ("packages", "bar".to_string(), b"bar package bits".to_vec()),
        ("packages", "baz".to_string(), b"baz package bits".to_vec()),
        ("jobs", "foobar".to_string(), b"foobar job bits".to_vec()),
      ],
    }
  }

  pub fn with_version(mut self, version: &str) -> Self {
    self.version = version.to_string();
    self
  }

  /// Fingerprint recorded for an artifact
  pub fn fingerprint(&self, name: &str) -> Option<String> {
    self
      .artifacts
      .iter()
      .find(|(_, n, _)| n == name)
      .map(|(kind, n, content)| hex(&[kind.as_bytes(), n.as_bytes(), content.as_slice()].concat()))
  }

  fn manifest(&self) -> String {
    let mut packages = String::new();
    let mut jobs = String::new();
    for (kind, name, content) in &self.artifacts {
      let fingerprint = hex(&[kind.as_bytes(), name.as_bytes(), content.as_slice()].concat());
      let entry = format!(
        "- name: {}\n  version: '{}'\n  fingerprint: '{}'\n  sha1: '{}'\n",
        name,
        fingerprint,
        fingerprint,
        hex(content)
      );
      match *kind {
        "packages" => packages.push_str(&format!("{}  dependencies: []\n", entry)),
        _ => jobs.push_str(&entry),
      }
    }
    format!(
      "name: {}\nversion: '{}'\ncommit_hash: abc1234\nuncommitted_changes: false\npackages:\n{}jobs:\n{}",
      self.name, self.version, packages, jobs
    )
  }

  /// Write `<name>-<version>.tgz` into `dir`
  pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
    let staging = TempDir::new()?;
    fs::write(staging.path().join("release.MF"), self.manifest())?;
    for (kind, name, content) in &self.artifacts {
      let kind_dir = staging.path().join(kind);
      fs::create_dir_all(&kind_dir)?;
      fs::write(kind_dir.join(format!("{}.tgz", name)), content)?;
    }

    let out = dir.join(format!("{}-{}.tgz", self.name, self.version));
    let encoder = GzEncoder::new(File::create(&out)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", staging.path())?;
    builder.into_inner()?.finish()?;
    Ok(out)
  }
}

fn hex(bytes: &[u8]) -> String {
  format!("{:x}", Sha1::digest(bytes))
}

/// Run relfin in `cwd`, whatever its exit status
pub fn relfin(cwd: &Path, args: &[&str]) -> Result<Output> {
  Command::new(env!("CARGO_BIN_EXE_relfin"))
    .current_dir(cwd)
    .env_remove("RELFIN_LOG")
    .args(args)
    .output()
    .context("Failed to run relfin")
}

/// Run relfin in `cwd`, failing unless it succeeds
pub fn run_relfin(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = relfin(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "relfin command failed: relfin {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}
