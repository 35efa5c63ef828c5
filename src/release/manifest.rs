//! Release manifest (`release.MF`) model
//!
//! The manifest is YAML. Only the fields finalize reads or rewrites are typed;
//! everything else (`commit_hash`, `uncommitted_changes`, per-artifact extras)
//! is carried through untouched so the rewritten manifest loses nothing.

use crate::core::error::{ReleaseResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of release artifact, named the way it appears on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
  Packages,
  Jobs,
  License,
}

impl ArtifactKind {
  /// Directory name under `.final_builds/` and inside release tarballs
  pub fn as_str(self) -> &'static str {
    match self {
      ArtifactKind::Packages => "packages",
      ArtifactKind::Jobs => "jobs",
      ArtifactKind::License => "license",
    }
  }
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One package, job or license entry of a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  #[serde(default)]
  pub name: String,
  pub version: String,
  /// Dedup key. Absent in manifests produced by outdated tooling.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fingerprint: Option<String>,
  #[serde(default)]
  pub sha1: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dependencies: Option<Vec<String>>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Artifact {
  /// Fingerprint if present and non-empty
  pub fn fingerprint(&self) -> Option<&str> {
    self.fingerprint.as_deref().filter(|f| !f.trim().is_empty())
  }
}

/// Parsed release manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseManifest {
  pub name: String,
  pub version: String,
  #[serde(default)]
  pub packages: Vec<Artifact>,
  #[serde(default)]
  pub jobs: Vec<Artifact>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license: Option<Artifact>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ReleaseManifest {
  /// Parse manifest YAML text
  pub fn from_yaml(text: &str) -> ReleaseResult<Self> {
    serde_yaml::from_str(text).context("Failed to parse release manifest")
  }

  /// Serialize back to YAML text
  pub fn to_yaml(&self) -> ReleaseResult<String> {
    serde_yaml::to_string(self).context("Failed to serialize release manifest")
  }

  /// Apply the final name and version
  pub fn rename(&mut self, name: &str, version: &str) {
    self.name = name.to_string();
    self.version = version.to_string();
  }

  /// Artifacts in upload order: packages, then jobs, then the license
  pub fn artifacts(&self) -> Vec<(ArtifactKind, &Artifact)> {
    let packages = self.packages.iter().map(|a| (ArtifactKind::Packages, a));
    let jobs = self.jobs.iter().map(|a| (ArtifactKind::Jobs, a));
    let license = self.license.iter().map(|a| (ArtifactKind::License, a));
    packages.chain(jobs).chain(license).collect()
  }
}
