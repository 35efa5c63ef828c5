//! Finalize progress display
//!
//! Uses `linya`, whose bars can be advanced from the upload worker threads.

use linya::{Bar, Progress};
use std::sync::Mutex;

/// Hooks the finalize run calls as it makes progress
///
/// Called from upload worker threads, hence `Sync`.
pub trait FinalizeObserver: Send + Sync {
  /// The run passed every check and starts writing the final release
  fn committing(&self, _from: &str, _to: &str) {}

  /// Uploads of `total` artifacts are about to start
  fn uploads_started(&self, _total: usize) {}

  /// One artifact is stored (uploaded or deduplicated)
  fn artifact_done(&self) {}
}

/// Observer that displays nothing
pub struct Silent;

impl FinalizeObserver for Silent {}

/// Console output with one upload bar per run
#[derive(Default)]
pub struct ConsoleProgress {
  uploads: Mutex<Option<(Progress, Bar)>>,
}

impl ConsoleProgress {
  pub fn new() -> Self {
    Self::default()
  }
}

impl FinalizeObserver for ConsoleProgress {
  fn committing(&self, from: &str, to: &str) {
    println!("🔒 Creating final release {} from dev release {}", to, from);
  }

  fn uploads_started(&self, total: usize) {
    let mut progress = Progress::new();
    let bar = progress.bar(total, "Uploading artifacts");
    // A poisoned lock only loses the bar
    if let Ok(mut uploads) = self.uploads.lock() {
      *uploads = Some((progress, bar));
    }
  }

  fn artifact_done(&self) {
    if let Ok(mut uploads) = self.uploads.lock()
      && let Some((progress, bar)) = uploads.as_mut()
    {
      progress.inc_and_draw(bar, 1);
    }
  }
}
