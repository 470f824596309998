//! Export driver: validation, destination resolution, optional stdout
//! streaming, and producer invocation.

mod destination;
mod errors;
mod transport;


use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use lx_domain::{ArchiveFormat, ExportRequest};

pub use destination::{
    resolve_destination, validate_format_compression, validate_request, Destination,
    ResolvedDestination, StdoutProbe, TerminalProbe,
};
pub use errors::{DestinationError, ExportError};
pub use transport::{PipeTransport, TransportError};

use crate::config::context::CommandContext;
use crate::core::producer::{ArchiveProducer, ExportPlan, LayoutProducer, ProduceReport};
use crate::outcome::ExecutionOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub format: ArchiveFormat,
    /// Destination path, `None` when streamed to stdout.
    pub output: Option<PathBuf>,
    pub quiet: bool,
    pub report: ProduceReport,
    /// Bytes forwarded to stdout by the copier.
    pub streamed_bytes: Option<u64>,
}

impl ExportSummary {
    pub fn streamed(&self) -> bool {
        self.output.is_none()
    }
}

pub struct Exporter<'a> {
    producer: &'a dyn ArchiveProducer,
    probe: &'a dyn TerminalProbe,
}

impl<'a> Exporter<'a> {
    pub fn new(producer: &'a dyn ArchiveProducer, probe: &'a dyn TerminalProbe) -> Self {
        Self { producer, probe }
    }

    /// Runs one export. `stdout` receives the archive when no output path is
    /// set and is dropped untouched otherwise.
    pub fn export<W>(&self, request: &ExportRequest, stdout: W) -> Result<ExportSummary, ExportError>
    where
        W: Write + Send + 'static,
    {
        self.export_with(request, move || Ok(stdout))
    }

    /// Like [`Exporter::export`], but only calls `open_stdout` once the
    /// request is valid and resolves to a stream.
    ///
    /// A producer failure is always the reported error; the copier's result
    /// is only consulted after the producer succeeded.
    pub fn export_with<W, F>(
        &self,
        request: &ExportRequest,
        open_stdout: F,
    ) -> Result<ExportSummary, ExportError>
    where
        W: Write + Send + 'static,
        F: FnOnce() -> io::Result<W>,
    {
        validate_request(request)?;
        let targets = request.targets()?;
        let resolved = resolve_destination(request, self.probe)?;
        let plan = ExportPlan::new(request, targets);

        match resolved.destination {
            Destination::File(path) => {
                let report = self.producer.produce(&path, &plan)?;
                Ok(ExportSummary {
                    format: request.format,
                    output: Some(path),
                    quiet: resolved.quiet,
                    report,
                    streamed_bytes: None,
                })
            }
            Destination::Stream => {
                let stdout = open_stdout().map_err(TransportError::Setup)?;
                let transport = PipeTransport::open(stdout)?;
                let produced = self.producer.produce(transport.conduit_path(), &plan);
                let copied = transport.finish(produced.is_ok());
                let report = produced?;
                let streamed_bytes = copied?;
                Ok(ExportSummary {
                    format: request.format,
                    output: None,
                    quiet: resolved.quiet,
                    report,
                    streamed_bytes,
                })
            }
        }
    }
}

/// Handle on fd 1 that bypasses the line buffering of [`io::Stdout`].
fn stdout_sink() -> io::Result<File> {
    let fd = io::stdout().as_fd().try_clone_to_owned()?;
    Ok(File::from(fd))
}

/// Exports the request's images with the store configured in `ctx`.
///
/// # Errors
/// Returns an error only for unexpected failures; export failures are turned
/// into a non-success [`ExecutionOutcome`].
pub fn export_image(ctx: &CommandContext, request: &ExportRequest) -> Result<ExecutionOutcome> {
    let producer = LayoutProducer::from_config(ctx.config());
    let probe = StdoutProbe;
    let exporter = Exporter::new(&producer, &probe);

    match exporter.export_with(request, stdout_sink) {
        Ok(summary) => Ok(success_outcome(&summary)),
        Err(err) => {
            tracing::debug!(kind = err.kind(), code = err.code(), %err, "export failed");
            let mut outcome = err.to_outcome();
            outcome.details["streamed"] = json!(request.writes_to_stdout());
            Ok(outcome)
        }
    }
}

fn success_outcome(summary: &ExportSummary) -> ExecutionOutcome {
    let images: Vec<&str> = summary
        .report
        .images
        .iter()
        .map(|image| image.reference.as_str())
        .collect();
    let target = summary.output.as_ref().map_or_else(
        || "stdout".to_string(),
        |path| path.display().to_string(),
    );
    let message = format!(
        "exported {} to {} ({})",
        images.join(", "),
        target,
        summary.format
    );
    ExecutionOutcome::success(
        message,
        json!({
            "format": summary.format,
            "output": summary.output.as_ref().map(|path| path.display().to_string()),
            "streamed": summary.streamed(),
            "quiet": summary.quiet,
            "images": summary.report.images,
            "bytes_written": summary.report.bytes_written,
            "streamed_bytes": summary.streamed_bytes,
        }),
    )
}
