//! Error taxonomy shared by the registry, handlers and orchestrator.

use parcel_schema::UrnError;
use thiserror::Error;

use crate::io::download::DownloadError;

/// Result alias used throughout the core.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by parcel operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    MalformedReference(#[from] UrnError),

    #[error("No handler registered for namespace '{0}'")]
    UnknownNamespace(String),

    #[error("A handler for namespace '{0}' is already registered")]
    DuplicateNamespace(String),

    #[error("Handler '{handler}' cannot handle '{got}'")]
    WrongNamespace { handler: String, got: String },

    #[error("{0} requires a version (expected <id>:<version>)")]
    VersionRequired(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error from {source_name}: {message}")]
    Upstream {
        source_name: String,
        message: String,
    },

    #[error("Malformed installer: {0}")]
    MalformedInstaller(String),

    #[error("Incompatible platform: {0}")]
    IncompatiblePlatform(String),

    #[error("Download failed: {0}")]
    DownloadFailed(DownloadError),

    #[error("Install rejected: {0}")]
    InstallRejected(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Cloneable discriminant of [`Error`], carried in bus events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedReference,
    UnknownNamespace,
    DuplicateNamespace,
    WrongNamespace,
    VersionRequired,
    NotFound,
    Upstream,
    MalformedInstaller,
    IncompatiblePlatform,
    DownloadFailed,
    InstallRejected,
    Cancelled,
    NotInstalled,
    Io,
    Config,
}

impl Error {
    /// Build an [`Error::Upstream`] from any displayable provider failure.
    pub fn upstream(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }

    /// Coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedReference(_) => ErrorKind::MalformedReference,
            Self::UnknownNamespace(_) => ErrorKind::UnknownNamespace,
            Self::DuplicateNamespace(_) => ErrorKind::DuplicateNamespace,
            Self::WrongNamespace { .. } => ErrorKind::WrongNamespace,
            Self::VersionRequired(_) => ErrorKind::VersionRequired,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::MalformedInstaller(_) => ErrorKind::MalformedInstaller,
            Self::IncompatiblePlatform(_) => ErrorKind::IncompatiblePlatform,
            Self::DownloadFailed(_) => ErrorKind::DownloadFailed,
            Self::InstallRejected(_) => ErrorKind::InstallRejected,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NotInstalled(_) => ErrorKind::NotInstalled,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<DownloadError> for Error {
    fn from(err: DownloadError) -> Self {
        match err {
            // A stalled transfer is treated exactly like an explicit cancel.
            DownloadError::Cancelled | DownloadError::Stalled(_) => Self::Cancelled,
            other => Self::DownloadFailed(other),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::MalformedInstaller(other.to_string()),
        }
    }
}
