#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod error;
pub mod filename;
pub mod format;
pub mod reference;
pub mod request;

pub use error::ConfigurationError;
pub use filename::validate_file_name;
pub use format::ArchiveFormat;
pub use reference::{ImageReference, DEFAULT_TAG};
pub use request::{ExportRequest, ExportTargets};
