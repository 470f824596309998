use std::io::{self, PipeReader, PipeWriter, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use thiserror::Error;

const FD_ROOT: &str = "/dev/fd";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to set up stdout conduit: {0}")]
    Setup(#[source] io::Error),
    #[error("failed to stream archive to stdout: {0}")]
    Copy(#[source] io::Error),
    #[error("stdout copier stopped without reporting a result")]
    CopierLost,
}

impl TransportError {
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            TransportError::Setup(_) => "conduit_setup",
            TransportError::Copy(_) => "stdout_write",
            TransportError::CopierLost => "copier_lost",
        }
    }
}

/// A pipe whose write end is reachable through a path, with one background
/// thread forwarding everything written to it into a sink.
///
/// The copier reports exactly once, after every write handle is closed and the
/// pipe is drained. Dropping the transport closes its own write handle, so the
/// copier always reaches end of stream once the producer is done.
pub struct PipeTransport {
    conduit: PathBuf,
    writer: Option<PipeWriter>,
    result: Receiver<io::Result<u64>>,
    closed: bool,
}

impl PipeTransport {
    /// Creates the pipe and spawns the copier.
    ///
    /// # Errors
    /// Returns [`TransportError::Setup`] if the pipe or the copier thread cannot
    /// be created.
    pub fn open<W>(sink: W) -> Result<Self, TransportError>
    where
        W: Write + Send + 'static,
    {
        if !Path::new(FD_ROOT).is_dir() {
            return Err(TransportError::Setup(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{FD_ROOT} is not available"),
            )));
        }
        let (reader, writer) = io::pipe().map_err(TransportError::Setup)?;
        let conduit = Path::new(FD_ROOT).join(writer.as_fd().as_raw_fd().to_string());

        let (result_tx, result_rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("lx-stdout-copy".into())
            .spawn(move || {
                let outcome = forward(reader, sink);
                if let Err(err) = &outcome {
                    tracing::debug!(%err, "stdout copier failed");
                }
                let _ = result_tx.send(outcome);
            })
            .map_err(TransportError::Setup)?;

        tracing::debug!(conduit = %conduit.display(), "opened stdout conduit");
        Ok(Self {
            conduit,
            writer: Some(writer),
            result: result_rx,
            closed: false,
        })
    }

    /// Path the producer opens for writing. Valid until the transport closes.
    pub fn conduit_path(&self) -> &Path {
        &self.conduit
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the transport and, only when the producer succeeded, waits for
    /// the copier's verdict. Returns the number of bytes forwarded when it
    /// waited.
    ///
    /// # Errors
    /// Returns [`TransportError::Copy`] when forwarding failed after a
    /// successful producer run.
    pub fn finish(mut self, producer_succeeded: bool) -> Result<Option<u64>, TransportError> {
        self.close();
        if !producer_succeeded {
            return Ok(None);
        }
        match self.result.recv() {
            Ok(Ok(bytes)) => {
                tracing::debug!(bytes, "stdout copier finished");
                Ok(Some(bytes))
            }
            Ok(Err(err)) => Err(TransportError::Copy(err)),
            Err(_) => Err(TransportError::CopierLost),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        drop(self.writer.take());
        tracing::debug!(conduit = %self.conduit.display(), "closed stdout conduit");
    }
}

impl Drop for PipeTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn forward<W: Write>(mut reader: PipeReader, mut sink: W) -> io::Result<u64> {
    let copied = io::copy(&mut reader, &mut sink)?;
    sink.flush()?;
    Ok(copied)
}
