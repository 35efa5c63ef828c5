//! Error types for release finalization with contextual messages and exit codes
//!
//! Every fatal condition of a finalize run maps onto one categorized variant of
//! [`ReleaseError`]. Each category knows its exit code and, where there is a
//! useful next step, a help message shown under the error line.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for relfin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (bad arguments, missing tarball, taken version)
  User = 1,
  /// System error (I/O, blobstore, index state)
  System = 2,
  /// Validation failure (bad tarball, unsynced blobs, malformed artifacts)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for relfin
#[derive(Debug)]
pub enum ReleaseError {
  /// Release repository configuration errors
  Config(ConfigError),

  /// Source tarball errors
  Tarball(TarballError),

  /// Version allocation errors
  Version(VersionError),

  /// Working-tree blob errors
  Blobs(BlobError),

  /// Artifact upload errors
  Artifact(ArtifactError),

  /// Persistent index errors
  Index(IndexError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  ///
  /// Categorized errors keep their category (and exit code); I/O errors are
  /// folded into a message so the context is not lost.
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReleaseError::Message { message, context, help } => ReleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ReleaseError::Io(e) => ReleaseError::Message {
        message: format!("{}: {}", ctx_str, e),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReleaseError::Config(_) => ExitCode::User,
      ReleaseError::Tarball(TarballError::NotFound { .. }) => ExitCode::User,
      ReleaseError::Tarball(_) => ExitCode::Validation,
      ReleaseError::Version(_) => ExitCode::User,
      ReleaseError::Blobs(_) => ExitCode::Validation,
      ReleaseError::Artifact(ArtifactError::MissingFingerprint { .. }) => ExitCode::Validation,
      ReleaseError::Artifact(_) => ExitCode::System,
      ReleaseError::Index(_) => ExitCode::System,
      ReleaseError::Io(_) => ExitCode::System,
      ReleaseError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::Config(e) => e.help_message(),
      ReleaseError::Tarball(e) => e.help_message(),
      ReleaseError::Version(e) => e.help_message(),
      ReleaseError::Blobs(e) => e.help_message(),
      ReleaseError::Artifact(e) => e.help_message(),
      ReleaseError::Index(e) => e.help_message(),
      ReleaseError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::Config(e) => write!(f, "{}", e),
      ReleaseError::Tarball(e) => write!(f, "{}", e),
      ReleaseError::Version(e) => write!(f, "{}", e),
      ReleaseError::Blobs(e) => write!(f, "{}", e),
      ReleaseError::Artifact(e) => write!(f, "{}", e),
      ReleaseError::Index(e) => write!(f, "{}", e),
      ReleaseError::Io(e) => write!(f, "I/O error: {}", e),
      ReleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io(err)
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<ConfigError> for ReleaseError {
  fn from(err: ConfigError) -> Self {
    ReleaseError::Config(err)
  }
}

impl From<TarballError> for ReleaseError {
  fn from(err: TarballError) -> Self {
    ReleaseError::Tarball(err)
  }
}

impl From<VersionError> for ReleaseError {
  fn from(err: VersionError) -> Self {
    ReleaseError::Version(err)
  }
}

impl From<BlobError> for ReleaseError {
  fn from(err: BlobError) -> Self {
    ReleaseError::Blobs(err)
  }
}

impl From<ArtifactError> for ReleaseError {
  fn from(err: ArtifactError) -> Self {
    ReleaseError::Artifact(err)
  }
}

impl From<IndexError> for ReleaseError {
  fn from(err: IndexError) -> Self {
    ReleaseError::Index(err)
  }
}

impl From<toml_edit::TomlError> for ReleaseError {
  fn from(err: toml_edit::TomlError) -> Self {
    ReleaseError::message(format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for ReleaseError {
  fn from(err: toml_edit::de::Error) -> Self {
    ReleaseError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_yaml::Error> for ReleaseError {
  fn from(err: serde_yaml::Error) -> Self {
    ReleaseError::message(format!("YAML error: {}", err))
  }
}

impl From<serde_json::Error> for ReleaseError {
  fn from(err: serde_json::Error) -> Self {
    ReleaseError::message(format!("JSON error: {}", err))
  }
}

impl From<walkdir::Error> for ReleaseError {
  fn from(err: walkdir::Error) -> Self {
    ReleaseError::message(format!("Directory walk error: {}", err))
  }
}

impl From<tempfile::PersistError> for ReleaseError {
  fn from(err: tempfile::PersistError) -> Self {
    ReleaseError::Io(err.error)
  }
}

impl From<std::path::StripPrefixError> for ReleaseError {
  fn from(err: std::path::StripPrefixError) -> Self {
    ReleaseError::message(format!("Path strip prefix error: {}", err))
  }
}

impl From<rayon::ThreadPoolBuildError> for ReleaseError {
  fn from(err: rayon::ThreadPoolBuildError) -> Self {
    ReleaseError::message(format!("Failed to start upload workers: {}", err))
  }
}

/// Release repository configuration errors
#[derive(Debug)]
pub enum ConfigError {
  /// Working directory is not a release repository
  NotReleaseDir { path: PathBuf },

  /// A required config file is missing
  NotFound { path: PathBuf },

  /// Blobstore provider has no built-in implementation
  UnsupportedProvider { provider: String },

  /// Missing required option
  MissingOption { option: String },

  /// Option present but unusable
  InvalidOption { option: String, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotReleaseDir { .. } => {
        Some("Run relfin from the root of a release repository (it needs config/, jobs/ and packages/).".to_string())
      }
      ConfigError::NotFound { path } => Some(format!(
        "Create {} with a [blobstore] section before finalizing.",
        path.display()
      )),
      ConfigError::UnsupportedProvider { .. } => {
        Some("Only the 'local' blobstore provider is built in. Set provider = \"local\".".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotReleaseDir { path } => {
        write!(f, "Not a release repository: {}", path.display())
      }
      ConfigError::NotFound { path } => {
        write!(f, "Release configuration not found: {}", path.display())
      }
      ConfigError::UnsupportedProvider { provider } => {
        write!(f, "Unsupported blobstore provider '{}'", provider)
      }
      ConfigError::MissingOption { option } => {
        write!(f, "Missing required option in config: {}", option)
      }
      ConfigError::InvalidOption { option, reason } => {
        write!(f, "Invalid option '{}': {}", option, reason)
      }
    }
  }
}

/// Source release tarball errors
#[derive(Debug)]
pub enum TarballError {
  /// Tarball path does not exist
  NotFound { path: PathBuf },

  /// Tarball failed structural validation
  Invalid { path: PathBuf, reasons: Vec<String> },
}

impl TarballError {
  fn help_message(&self) -> Option<String> {
    match self {
      TarballError::NotFound { .. } => Some("Check the path to the dev release tarball.".to_string()),
      TarballError::Invalid { .. } => Some("Rebuild the dev release tarball and try again.".to_string()),
    }
  }
}

impl fmt::Display for TarballError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TarballError::NotFound { path } => {
        write!(f, "Cannot find release tarball {}", path.display())
      }
      TarballError::Invalid { path, reasons } => {
        write!(f, "Release tarball {} is invalid: {}", path.display(), reasons.join("; "))
      }
    }
  }
}

/// Version allocation errors
#[derive(Debug)]
pub enum VersionError {
  /// Source tarball already carries a final version
  AlreadyFinal { version: String },

  /// Requested or computed version was already issued
  Conflict { name: String, version: String },

  /// Version string is not a release version
  Parse { version: String, reason: String },
}

impl VersionError {
  fn help_message(&self) -> Option<String> {
    match self {
      VersionError::AlreadyFinal { .. } => {
        Some("Only dev release tarballs can be finalized. Pass the tarball of a dev release.".to_string())
      }
      VersionError::Conflict { .. } => {
        Some("Pick another --version, or omit it to use the next free version.".to_string())
      }
      VersionError::Parse { .. } => None,
    }
  }
}

impl fmt::Display for VersionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionError::AlreadyFinal { version } => {
        write!(f, "Release tarball already has final version {}", version)
      }
      VersionError::Conflict { name, version } => {
        write!(f, "Release version already exists: {}/{}", name, version)
      }
      VersionError::Parse { version, reason } => {
        write!(f, "Invalid release version '{}': {}", version, reason)
      }
    }
  }
}

/// Working-tree blob errors
#[derive(Debug)]
pub enum BlobError {
  /// Local blobs are not uploaded yet
  Unsynced { paths: Vec<String> },
}

impl BlobError {
  fn help_message(&self) -> Option<String> {
    match self {
      BlobError::Unsynced { .. } => Some("Upload new blobs (or force-upload the listed files), then finalize again.".to_string()),
    }
  }
}

impl fmt::Display for BlobError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BlobError::Unsynced { paths } => {
        write!(f, "Working tree has {} blob(s) not uploaded: {}", paths.len(), paths.join(", "))
      }
    }
  }
}

/// Artifact upload errors
#[derive(Debug)]
pub enum ArtifactError {
  /// Artifact carries no fingerprint
  MissingFingerprint { kind: String, name: String },

  /// Blobstore rejected or failed the upload
  UploadFailed { kind: String, name: String, reason: String },
}

impl ArtifactError {
  fn help_message(&self) -> Option<String> {
    match self {
      ArtifactError::MissingFingerprint { .. } => {
        Some("Cannot find artifact complete information, please upgrade tarball to newer version.".to_string())
      }
      ArtifactError::UploadFailed { .. } => Some("Check blobstore availability and finalize again; uploaded artifacts are reused.".to_string()),
    }
  }
}

impl fmt::Display for ArtifactError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ArtifactError::MissingFingerprint { kind, name } => {
        write!(f, "Artifact {}/{} has no fingerprint", kind, name)
      }
      ArtifactError::UploadFailed { kind, name, reason } => {
        write!(f, "Failed to upload {}/{} to blobstore: {}", kind, name, reason)
      }
    }
  }
}

/// Persistent index errors
#[derive(Debug)]
pub enum IndexError {
  /// An existing entry disagrees with the entry being recorded
  Conflict { index: PathBuf, key: String },

  /// Index file cannot be read as an index
  Corrupt { index: PathBuf, reason: String },
}

impl IndexError {
  fn help_message(&self) -> Option<String> {
    match self {
      IndexError::Conflict { .. } | IndexError::Corrupt { .. } => {
        Some("The index was modified outside relfin. Restore it from version control.".to_string())
      }
    }
  }
}

impl fmt::Display for IndexError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      IndexError::Conflict { index, key } => {
        write!(f, "Index {} already holds a different entry for '{}'", index.display(), key)
      }
      IndexError::Corrupt { index, reason } => {
        write!(f, "Index {} is corrupt: {}", index.display(), reason)
      }
    }
  }
}

/// Result type alias for relfin
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Print an error to stderr with help text
pub fn print_error(error: &ReleaseError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

impl From<anyhow::Error> for ReleaseError {
  fn from(err: anyhow::Error) -> Self {
    ReleaseError::message(err.to_string())
  }
}
