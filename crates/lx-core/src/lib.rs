#![deny(clippy::all)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod core;

pub(crate) use crate::core::config;
pub(crate) use crate::core::tooling::outcome;

pub use crate::core::config::context::{CommandContext, CommandInfo};
pub use crate::core::config::{Config, GlobalOptions, ScratchConfig, StoreConfig};
pub use crate::core::runtime::{format_status_message, to_json_response, CommandGroup};
pub use crate::core::tooling::diagnostics::codes as diag_codes;
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};

pub use crate::core::export::{
    export_image, resolve_destination, validate_format_compression, validate_request,
    Destination, DestinationError, ExportError, ExportSummary, Exporter, PipeTransport,
    ResolvedDestination, StdoutProbe, TerminalProbe, TransportError,
};
pub use crate::core::producer::{
    ArchiveProducer, ExportPlan, ExportedImage, ImageStore, LayoutProducer, ProduceReport,
    ProducerError,
};

pub use lx_domain::{ArchiveFormat, ConfigurationError, ExportRequest, ImageReference};
