//! Release repository configuration
//!
//! Two files live under `config/`:
//!
//! - `final.toml` is committed and describes where final artifacts go:
//!
//!   ```toml
//!   [blobstore]
//!   provider = "local"
//!
//!   [blobstore.options]
//!   blobstore_path = "/var/blobs"
//!
//!   [uploads]
//!   max_parallel = 4
//!   ```
//!
//! - `dev.toml` is local state. Finalize only touches `latest_release_filename`
//!   and leaves the rest of the document (keys, comments, layout) as it was.

use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::DocumentMut;

/// Directory holding repository config, relative to the repository root
pub const CONFIG_DIR: &str = "config";

const FINAL_CONFIG_FILE: &str = "final.toml";
const DEV_CONFIG_FILE: &str = "dev.toml";
const LATEST_RELEASE_KEY: &str = "latest_release_filename";

/// Committed release configuration (`config/final.toml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalConfig {
  pub blobstore: BlobstoreConfig,
  #[serde(default)]
  pub uploads: UploadConfig,
}

/// Blobstore provider selection and provider-specific options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobstoreConfig {
  pub provider: String,
  #[serde(default)]
  pub options: BTreeMap<String, String>,
}

impl BlobstoreConfig {
  /// Look up a required provider option
  pub fn require_option(&self, option: &str) -> ReleaseResult<&str> {
    self.options.get(option).map(String::as_str).ok_or_else(|| {
      ReleaseError::Config(ConfigError::MissingOption {
        option: format!("blobstore.options.{}", option),
      })
    })
  }
}

/// Upload worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
  /// Upper bound on concurrent artifact uploads
  #[serde(default = "default_max_parallel")]
  pub max_parallel: usize,
}

fn default_max_parallel() -> usize {
  4
}

impl Default for UploadConfig {
  fn default() -> Self {
    Self {
      max_parallel: default_max_parallel(),
    }
  }
}

impl FinalConfig {
  /// Path of `final.toml` under a repository root
  pub fn path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(FINAL_CONFIG_FILE)
  }

  /// Load and validate `config/final.toml`
  pub fn load(root: &Path) -> ReleaseResult<Self> {
    let config_path = Self::path(root);
    if !config_path.exists() {
      return Err(ReleaseError::Config(ConfigError::NotFound { path: config_path }));
    }

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config: FinalConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

    config.validate()?;
    Ok(config)
  }

  /// Validate option values that serde cannot express
  pub fn validate(&self) -> ReleaseResult<()> {
    if self.uploads.max_parallel == 0 {
      return Err(ReleaseError::Config(ConfigError::InvalidOption {
        option: "uploads.max_parallel".to_string(),
        reason: "must be at least 1".to_string(),
      }));
    }
    if self.blobstore.provider.trim().is_empty() {
      return Err(ReleaseError::Config(ConfigError::MissingOption {
        option: "blobstore.provider".to_string(),
      }));
    }
    Ok(())
  }
}

/// Path of `dev.toml` under a repository root
pub fn dev_config_path(root: &Path) -> PathBuf {
  root.join(CONFIG_DIR).join(DEV_CONFIG_FILE)
}

/// Read the pointer to the newest finalized manifest, if any
#[cfg(test)]
pub fn latest_release_filename(root: &Path) -> ReleaseResult<Option<String>> {
  let path = dev_config_path(root);
  if !path.exists() {
    return Ok(None);
  }
  let doc = read_document(&path)?;
  Ok(doc.get(LATEST_RELEASE_KEY).and_then(|item| item.as_str()).map(str::to_string))
}

/// Point the repository at a newly finalized manifest
pub fn set_latest_release_filename(root: &Path, filename: &str) -> ReleaseResult<()> {
  let path = dev_config_path(root);
  let mut doc = if path.exists() {
    read_document(&path)?
  } else {
    DocumentMut::new()
  };

  doc[LATEST_RELEASE_KEY] = toml_edit::value(filename);

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }
  fs::write(&path, doc.to_string()).with_context(|| format!("Failed to write config to {}", path.display()))?;
  Ok(())
}

fn read_document(path: &Path) -> ReleaseResult<DocumentMut> {
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read config from {}", path.display()))?;
  content
    .parse::<DocumentMut>()
    .with_context(|| format!("Failed to parse config from {}", path.display()))
}
