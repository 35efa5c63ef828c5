//! Dev release tarballs for unit tests

use crate::release::manifest::{Artifact, ArtifactKind, ReleaseManifest};
use flate2::Compression;
use flate2::write::GzEncoder;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Builder for a small, valid dev release tarball
pub struct DevRelease {
  name: String,
  version: String,
  artifacts: Vec<(ArtifactKind, String, Vec<u8>)>,
  include_manifest: bool,
  corrupt_sha1: HashSet<String>,
  missing_files: HashSet<String>,
  missing_fingerprints: HashSet<String>,
}

fn sha1_hex(bytes: &[u8]) -> String {
  format!("{:x}", Sha1::digest(bytes))
}

impl DevRelease {
  /// `dummy/0.2-dev` with packages `bar` and `baz`, job `foobar` and a license
  pub fn dummy() -> Self {
    Self {
      name: "dummy".to_string(),
      version: "0.2-dev".to_string(),
      artifacts: vec![
        (ArtifactKind::Packages, "bar".to_string(), b"package bar".to_vec()),
        (ArtifactKind::Packages, "baz".to_string(), b"package baz".to_vec()),
        (ArtifactKind::Jobs, "foobar".to_string(), b"job foobar".to_vec()),
        (ArtifactKind::License, "license".to_string(), b"MIT license".to_vec()),
      ],
      include_manifest: true,
      corrupt_sha1: HashSet::new(),
      missing_files: HashSet::new(),
      missing_fingerprints: HashSet::new(),
    }
  }

  pub fn with_name(mut self, name: &str) -> Self {
    self.name = name.to_string();
    self
  }

  pub fn with_version(mut self, version: &str) -> Self {
    self.version = version.to_string();
    self
  }

  /// Change the content (and so the fingerprint) of one artifact
  pub fn with_content(mut self, name: &str, content: &[u8]) -> Self {
    for (_, artifact, bytes) in &mut self.artifacts {
      if artifact == name {
        *bytes = content.to_vec();
      }
    }
    self
  }

  pub fn without_manifest(mut self) -> Self {
    self.include_manifest = false;
    self
  }

  pub fn with_corrupt_sha1(mut self, name: &str) -> Self {
    self.corrupt_sha1.insert(name.to_string());
    self
  }

  pub fn without_artifact_file(mut self, name: &str) -> Self {
    self.missing_files.insert(name.to_string());
    self
  }

  pub fn without_fingerprint(mut self, name: &str) -> Self {
    self.missing_fingerprints.insert(name.to_string());
    self
  }

  /// Fingerprint the manifest records for an artifact
  pub fn fingerprint_of(&self, name: &str) -> Option<String> {
    self
      .artifacts
      .iter()
      .find(|(_, artifact, _)| artifact == name)
      .map(|(kind, artifact, bytes)| fingerprint(*kind, artifact, bytes))
  }

  pub fn manifest(&self) -> ReleaseManifest {
    let mut manifest = ReleaseManifest {
      name: self.name.clone(),
      version: self.version.clone(),
      packages: Vec::new(),
      jobs: Vec::new(),
      license: None,
      extra: BTreeMap::new(),
    };
    manifest
      .extra
      .insert("commit_hash".to_string(), serde_yaml::Value::String("00000000".to_string()));

    for (kind, name, bytes) in &self.artifacts {
      let fp = fingerprint(*kind, name, bytes);
      let artifact = Artifact {
        name: if *kind == ArtifactKind::License { String::new() } else { name.clone() },
        version: fp.clone(),
        fingerprint: (!self.missing_fingerprints.contains(name)).then_some(fp),
        sha1: if self.corrupt_sha1.contains(name) {
          "0".repeat(40)
        } else {
          sha1_hex(bytes)
        },
        dependencies: (*kind == ArtifactKind::Packages).then(Vec::new),
        extra: BTreeMap::new(),
      };
      match kind {
        ArtifactKind::Packages => manifest.packages.push(artifact),
        ArtifactKind::Jobs => manifest.jobs.push(artifact),
        ArtifactKind::License => manifest.license = Some(artifact),
      }
    }
    manifest
  }

  /// Write the tarball into `dir`, returning its path
  pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
    let staging = tempfile::TempDir::new()?;
    let root = staging.path();

    if self.include_manifest {
      let yaml = self.manifest().to_yaml().map_err(|e| io::Error::other(e.to_string()))?;
      fs::write(root.join("release.MF"), yaml)?;
    }

    for (kind, name, bytes) in &self.artifacts {
      if self.missing_files.contains(name) {
        continue;
      }
      let path = match kind {
        ArtifactKind::License => root.join("license.tgz"),
        _ => root.join(kind.as_str()).join(format!("{}.tgz", name)),
      };
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::write(path, bytes)?;
    }

    fs::create_dir_all(dir)?;
    let out = dir.join(format!("{}-{}.tgz", self.name, self.version));
    let encoder = GzEncoder::new(File::create(&out)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", root)?;
    builder.into_inner()?.finish()?;
    Ok(out)
  }
}

fn fingerprint(kind: ArtifactKind, name: &str, bytes: &[u8]) -> String {
  let mut hasher = Sha1::new();
  hasher.update(kind.as_str().as_bytes());
  hasher.update(name.as_bytes());
  hasher.update(bytes);
  format!("{:x}", hasher.finalize())
}
