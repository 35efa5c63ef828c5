//! CLI commands for relfin
//!
//! - **finalize**: turn a dev release tarball into a final release
//!
//! Commands accept `&ReleaseRepo` so the repository is opened once in main.

pub mod finalize;

pub use finalize::run_finalize_release;
