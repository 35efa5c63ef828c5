//! Release version numbers
//!
//! Release versions look like `RELEASE[-PRE][+POST]` where `RELEASE` is one or
//! more dot-separated counters (`3`, `8.1`, `1.0.2`). Pre-release and
//! post-release suffixes reuse semver's identifier rules and precedence:
//! `1-rc.1 < 1 < 1+dev.1`. Unlike semver the release segment may have any
//! number of counters, and missing trailing counters compare as zero.

use crate::core::error::{ReleaseError, VersionError};
use semver::{BuildMetadata, Prerelease};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Identifier prefix marking development builds (`0.2-dev`, `8.1+dev.3`)
const DEV_IDENTIFIER: &str = "dev";

#[derive(Debug, Clone)]
pub struct ReleaseVersion {
  release: Vec<u64>,
  pre: Prerelease,
  post: BuildMetadata,
}

impl ReleaseVersion {
  /// Parse a version string
  pub fn parse(input: &str) -> Result<Self, ReleaseError> {
    let invalid = |reason: &str| {
      ReleaseError::Version(VersionError::Parse {
        version: input.to_string(),
        reason: reason.to_string(),
      })
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
      return Err(invalid("empty version"));
    }

    let (rest, post) = match trimmed.split_once('+') {
      Some((_, "")) => return Err(invalid("empty post-release segment")),
      Some((rest, post)) => (rest, BuildMetadata::new(post).map_err(|e| invalid(&e.to_string()))?),
      None => (trimmed, BuildMetadata::EMPTY),
    };

    let (release_str, pre) = match rest.split_once('-') {
      Some((_, "")) => return Err(invalid("empty pre-release segment")),
      Some((release, pre)) => (release, Prerelease::new(pre).map_err(|e| invalid(&e.to_string()))?),
      None => (rest, Prerelease::EMPTY),
    };

    let release = release_str
      .split('.')
      .map(|part| {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
          return Err(invalid("release segment must be dot-separated numbers"));
        }
        part.parse::<u64>().map_err(|e| invalid(&e.to_string()))
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self { release, pre, post })
  }

  /// Version that precedes every issued release
  pub fn zero() -> Self {
    Self {
      release: vec![0],
      pre: Prerelease::EMPTY,
      post: BuildMetadata::EMPTY,
    }
  }

  /// Next release: bump the last release counter and drop both suffixes
  ///
  /// `2 → 3`, `8.1 → 8.2`, `8.1+dev.3 → 8.2`.
  pub fn increment_release(&self) -> Self {
    let mut release = self.release.clone();
    if let Some(last) = release.last_mut() {
      *last += 1;
    }
    Self {
      release,
      pre: Prerelease::EMPTY,
      post: BuildMetadata::EMPTY,
    }
  }

  /// Whether this version denotes a development build
  pub fn is_dev_build(&self) -> bool {
    let is_dev = |segment: &str| {
      !segment.is_empty() && segment.split('.').any(|ident| ident.starts_with(DEV_IDENTIFIER))
    };
    is_dev(self.pre.as_str()) || is_dev(self.post.as_str())
  }

  fn release_component(&self, idx: usize) -> u64 {
    self.release.get(idx).copied().unwrap_or(0)
  }
}

impl FromStr for ReleaseVersion {
  type Err = ReleaseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for ReleaseVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
    write!(f, "{}", release.join("."))?;
    if !self.pre.is_empty() {
      write!(f, "-{}", self.pre)?;
    }
    if !self.post.is_empty() {
      write!(f, "+{}", self.post)?;
    }
    Ok(())
  }
}

impl Ord for ReleaseVersion {
  fn cmp(&self, other: &Self) -> Ordering {
    let width = self.release.len().max(other.release.len());
    for idx in 0..width {
      match self.release_component(idx).cmp(&other.release_component(idx)) {
        Ordering::Equal => {}
        ord => return ord,
      }
    }
    // semver precedence: an empty pre-release sorts after any pre-release,
    // an empty post-release sorts before any post-release
    self.pre.cmp(&other.pre).then_with(|| self.post.cmp(&other.post))
  }
}

impl PartialOrd for ReleaseVersion {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for ReleaseVersion {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for ReleaseVersion {}
