//! Small helpers shared by the tarball, blob and report code

use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Compute the SHA-1 of a file as lowercase hex
pub fn file_sha1(path: &Path) -> io::Result<String> {
  let mut file = File::open(path)?;
  let mut hasher = Sha1::new();
  let mut buf = [0u8; 64 * 1024];
  loop {
    let n = file.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(format!("{:x}", hasher.finalize()))
}

/// Render a byte count in human units (`512B`, `1.5K`, `3.2M`)
pub fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["K", "M", "G", "T"];

  if bytes < 1024 {
    return format!("{}B", bytes);
  }

  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  format!("{:.1}{}", size, UNITS[unit])
}

/// Whether `name` is safe to use as a single path component
///
/// Release and artifact names become directory and file names, so they may
/// not be empty, `.` or `..`, or contain a path separator.
pub fn is_plain_name(name: &str) -> bool {
  !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Render a path relative to a root with forward slashes
///
/// Falls back to the full path when `path` is not under `root`.
pub fn display_relative(root: &Path, path: &Path) -> String {
  let rel = path.strip_prefix(root).unwrap_or(path);
  rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;
  use tempfile::TempDir;

  #[test]
  fn test_file_sha1() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("hello.txt");
    std::fs::write(&path, "hello").unwrap();
    assert_eq!(file_sha1(&path).unwrap(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
  }

  #[test]
  fn test_human_size() {
    assert_eq!(human_size(0), "0B");
    assert_eq!(human_size(1023), "1023B");
    assert_eq!(human_size(1536), "1.5K");
    assert_eq!(human_size(3 * 1024 * 1024), "3.0M");
  }

  #[test]
  fn test_plain_names() {
    assert!(is_plain_name("dummy"));
    assert!(is_plain_name("golang-1.21"));
    assert!(is_plain_name("a..b"));
    for name in ["", ".", "..", "../x", "a/b", "a\\b"] {
      assert!(!is_plain_name(name), "{name:?} accepted");
    }
  }

  #[test]
  fn test_display_relative() {
    let root = PathBuf::from("/repo");
    assert_eq!(
      display_relative(&root, &PathBuf::from("/repo/releases/a/a-1.yml")),
      "releases/a/a-1.yml"
    );
    assert_eq!(display_relative(&root, &PathBuf::from("/elsewhere/x")), "/elsewhere/x");
  }
}
