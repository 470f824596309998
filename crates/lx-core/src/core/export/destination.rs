use std::fs;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use lx_domain::{validate_file_name, ConfigurationError, ExportRequest};

use super::errors::{DestinationError, ExportError};
use crate::core::producer::may_write_layout;

/// Reports whether the process's standard output is an interactive terminal.
pub trait TerminalProbe {
    fn stdout_is_terminal(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutProbe;

impl TerminalProbe for StdoutProbe {
    fn stdout_is_terminal(&self) -> bool {
        io::stdout().is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Write straight to this path.
    File(PathBuf),
    /// Stream through a conduit to standard output.
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    pub destination: Destination,
    /// Effective quiet setting; always true when streaming.
    pub quiet: bool,
}

/// Runs before anything is allocated.
pub fn validate_format_compression(request: &ExportRequest) -> Result<(), ConfigurationError> {
    if request.compress && !request.format.is_directory_layout() {
        return Err(ConfigurationError::CompressRequiresDirectoryLayout {
            format: request.format,
        });
    }
    Ok(())
}

/// Flag combinations beyond compression, plus reference parsing.
pub fn validate_request(request: &ExportRequest) -> Result<(), ConfigurationError> {
    validate_format_compression(request)?;
    if request.multi_image_archive && !request.format.supports_multi_image() {
        return Err(ConfigurationError::MultiImageRequiresDockerArchive {
            format: request.format,
        });
    }
    if request.writes_to_stdout() && request.format.is_directory_layout() {
        return Err(ConfigurationError::DirectoryLayoutNeedsOutput {
            format: request.format,
        });
    }
    request.targets()?;
    Ok(())
}

/// Picks where the archive goes. Directory layouts only land on a path that
/// is absent, empty, or holds a layout from an earlier export.
pub fn resolve_destination(
    request: &ExportRequest,
    probe: &dyn TerminalProbe,
) -> Result<ResolvedDestination, ExportError> {
    if request.writes_to_stdout() {
        if probe.stdout_is_terminal() {
            return Err(DestinationError::RefusesTerminal.into());
        }
        return Ok(ResolvedDestination {
            destination: Destination::Stream,
            quiet: true,
        });
    }

    validate_file_name(&request.output_path)?;
    let path = PathBuf::from(&request.output_path);
    let collides = if request.format.is_directory_layout() {
        !may_write_layout(&path).unwrap_or(false)
    } else {
        fs::metadata(&path).is_ok_and(|meta| meta.is_dir())
    };
    if collides {
        return Err(ConfigurationError::DirectoryCollision { path }.into());
    }
    Ok(ResolvedDestination {
        destination: Destination::File(path),
        quiet: request.quiet,
    })
}
