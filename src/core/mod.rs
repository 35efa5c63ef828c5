//! Ambient building blocks shared by every relfin operation
//!
//! - **config**: `config/final.toml` and the `config/dev.toml` release pointer
//! - **context**: the release repository, opened once and passed by reference
//! - **error**: error types with contextual help messages and exit codes
//! - **logging**: `tracing` subscriber setup

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
