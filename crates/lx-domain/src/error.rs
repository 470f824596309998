use std::path::PathBuf;

use thiserror::Error;

use crate::format::ArchiveFormat;

/// Invalid flag combinations or user supplied values, detected before any
/// filesystem or pipe resource is allocated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("--compress can only be set when --format is either 'oci-dir' or 'docker-dir'")]
    CompressRequiresDirectoryLayout { format: ArchiveFormat },
    #[error("invalid filename {name:?} (should not contain {found:?})")]
    InvalidFileName { name: String, found: char },
    #[error("output path {} is an existing directory", path.display())]
    DirectoryCollision { path: PathBuf },
    #[error("--multi-image-archive can only be used with --format 'docker-archive'")]
    MultiImageRequiresDockerArchive { format: ArchiveFormat },
    #[error("format '{format}' writes a directory and cannot be streamed to stdout; use -o")]
    DirectoryLayoutNeedsOutput { format: ArchiveFormat },
    #[error("need at least 1 image reference")]
    MissingImage,
    #[error("invalid image reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },
}

impl ConfigurationError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigurationError::CompressRequiresDirectoryLayout { .. } => "LX101",
            ConfigurationError::InvalidFileName { .. }
            | ConfigurationError::DirectoryCollision { .. } => "LX102",
            ConfigurationError::MultiImageRequiresDockerArchive { .. } => "LX103",
            ConfigurationError::DirectoryLayoutNeedsOutput { .. } => "LX104",
            ConfigurationError::MissingImage | ConfigurationError::InvalidReference { .. } => {
                "LX105"
            }
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ConfigurationError::CompressRequiresDirectoryLayout { .. } => "compress_format",
            ConfigurationError::InvalidFileName { .. } => "invalid_filename",
            ConfigurationError::DirectoryCollision { .. } => "directory_collision",
            ConfigurationError::MultiImageRequiresDockerArchive { .. } => "multi_image_format",
            ConfigurationError::DirectoryLayoutNeedsOutput { .. } => "directory_needs_output",
            ConfigurationError::MissingImage => "missing_image",
            ConfigurationError::InvalidReference { .. } => "invalid_reference",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConfigurationError::CompressRequiresDirectoryLayout { .. } => {
                Some("drop --compress or pass --format oci-dir / docker-dir")
            }
            ConfigurationError::DirectoryLayoutNeedsOutput { .. } => {
                Some("pass -o <DIR> to choose where the layout is written")
            }
            ConfigurationError::DirectoryCollision { .. } => {
                Some("choose another path or remove the existing directory")
            }
            _ => None,
        }
    }
}
