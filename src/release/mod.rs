//! Release content: versions, manifests, source tarballs and version allocation
//!
//! - **version**: `RELEASE[-PRE][+POST]` release versions and their ordering
//! - **manifest**: `release.MF` model, with artifacts in upload order
//! - **tarball**: the `ArtifactSource` seam and the gzip tar implementation
//! - **allocator**: picks the final version for a finalize run

pub mod allocator;
pub mod manifest;
pub mod tarball;
pub mod version;

#[cfg(test)]
pub mod fixtures;
