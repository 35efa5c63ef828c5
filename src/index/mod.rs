//! Persistent, append-only indices of a release repository
//!
//! - **versions**: final versions issued per release name (`releases/<name>/index.yml`)
//! - **final_builds**: fingerprint → blobstore entry per artifact (`.final_builds/...`)
//! - **file**: the locked YAML file format both are stored in

pub mod file;
pub mod final_builds;
pub mod versions;
