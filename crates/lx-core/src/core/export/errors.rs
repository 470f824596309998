use serde_json::{json, Value};
use thiserror::Error;

use lx_domain::ConfigurationError;

use super::transport::TransportError;
use crate::core::producer::ProducerError;
use crate::core::tooling::diagnostics::codes;
use crate::outcome::ExecutionOutcome;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DestinationError {
    #[error("refusing to export to terminal. Use -o flag or redirect")]
    RefusesTerminal,
}

/// Every way an export can fail, one variant per kind so callers can tell
/// them apart.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Destination(#[from] DestinationError),
    #[error(transparent)]
    Producer(#[from] ProducerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ExportError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Configuration(_) => "configuration",
            ExportError::Destination(_) => "destination",
            ExportError::Producer(_) => "producer",
            ExportError::Transport(_) => "transport",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ExportError::Configuration(err) => err.code(),
            ExportError::Destination(_) => codes::TERMINAL_OUTPUT,
            ExportError::Producer(_) => codes::PRODUCER,
            ExportError::Transport(_) => codes::TRANSPORT,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ExportError::Configuration(err) => err.reason(),
            ExportError::Destination(DestinationError::RefusesTerminal) => "terminal_output",
            ExportError::Producer(err) => err.reason(),
            ExportError::Transport(err) => err.reason(),
        }
    }

    fn hint(&self) -> Option<&'static str> {
        match self {
            ExportError::Configuration(err) => err.hint(),
            ExportError::Destination(_) => {
                Some("redirect stdout to a file or pipe, or pass -o <PATH>")
            }
            ExportError::Producer(ProducerError::ImageNotFound { .. }) => {
                Some("check the reference or point LX_STORE at the image store")
            }
            ExportError::Transport(_) => {
                Some("make sure the command reading stdout consumes the whole archive")
            }
            ExportError::Producer(_) => None,
        }
    }

    /// Configuration and destination problems are the user's to fix; producer
    /// and transport failures are runtime failures.
    pub fn to_outcome(&self) -> ExecutionOutcome {
        let mut details = json!({
            "code": self.code(),
            "kind": self.kind(),
            "reason": self.reason(),
        });
        if let Some(hint) = self.hint() {
            details["hint"] = Value::String(hint.to_string());
        }
        match self {
            ExportError::Configuration(_) | ExportError::Destination(_) => {
                ExecutionOutcome::user_error(self.to_string(), details)
            }
            ExportError::Producer(_) | ExportError::Transport(_) => {
                ExecutionOutcome::failure(self.to_string(), details)
            }
        }
    }
}
