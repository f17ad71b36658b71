//! Error types for the Tally pipeline
//!
//! Every component surfaces one of these variants unchanged; the orchestration
//! only wraps them in a [`RunFailure`] naming the stage that failed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while producing or delivering a report
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Could not open a connection to the data source
    #[error("Data source unavailable: {message}")]
    SourceUnavailable { message: String, timed_out: bool },

    /// The connection opened but the query failed or could not be decoded
    #[error("Query failed: {message}")]
    QueryFailed { message: String, timed_out: bool },

    /// The artifact could not be removed, written, or moved into place
    #[error("Failed to write artifact {}: {source}", path.display())]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact is missing or unreadable at compose time
    #[error("Attachment unavailable at {}: {reason}", path.display())]
    AttachmentUnavailable { path: PathBuf, reason: String },

    /// The recipient list is empty or contains a malformed address
    #[error("Invalid recipients: {0}")]
    InvalidRecipients(String),

    /// The artifact holds no rows and the run requires at least one
    #[error("Report for {0} has no rows")]
    EmptyReport(String),

    /// Could not connect to or secure the mail transport
    #[error("Mail transport unreachable: {message}")]
    TransportUnreachable { message: String, timed_out: bool },

    /// The mail transport rejected the credential
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The mail transport rejected the message during transmission
    #[error("Send failed: {message}")]
    SendFailed { message: String, timed_out: bool },
}

impl PipelineError {
    /// Create a source error for a failed connection attempt
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a query error for a failed execution
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a transport error for a failed connection attempt
    pub fn transport_unreachable(message: impl Into<String>) -> Self {
        Self::TransportUnreachable {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Create a transmission error
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::QueryFailed { .. } => ErrorKind::QueryFailed,
            Self::ArtifactWriteFailed { .. } => ErrorKind::ArtifactWriteFailed,
            Self::AttachmentUnavailable { .. } => ErrorKind::AttachmentUnavailable,
            Self::InvalidRecipients(_) => ErrorKind::InvalidRecipients,
            Self::EmptyReport(_) => ErrorKind::EmptyReport,
            Self::TransportUnreachable { .. } => ErrorKind::TransportUnreachable,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::SendFailed { .. } => ErrorKind::SendFailed,
        }
    }

    /// Check if the operation timed out
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { timed_out: true, .. }
                | Self::QueryFailed { timed_out: true, .. }
                | Self::TransportUnreachable { timed_out: true, .. }
                | Self::SendFailed { timed_out: true, .. }
        )
    }

    /// Check if a later run could succeed without operator intervention
    ///
    /// Unreachable endpoints and timeouts are retryable. Rejected credentials,
    /// malformed recipients, and broken artifacts are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::TransportUnreachable { .. }
        ) || self.is_timeout()
    }
}

/// Error kind as reported to the external scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    SourceUnavailable,
    QueryFailed,
    ArtifactWriteFailed,
    AttachmentUnavailable,
    InvalidRecipients,
    EmptyReport,
    TransportUnreachable,
    AuthenticationFailed,
    SendFailed,
}

/// Pipeline stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Validation of the trigger input, before any stage runs
    Trigger,
    Fetch,
    Write,
    Compose,
    Send,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Trigger => "trigger",
            Stage::Fetch => "fetch",
            Stage::Write => "write",
            Stage::Compose => "compose",
            Stage::Send => "send",
        };
        f.write_str(name)
    }
}

/// A pipeline error tagged with the stage it came from
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
}

impl RunFailure {
    pub fn new(stage: Stage, error: PipelineError) -> Self {
        Self { stage, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::source_unavailable("refused").is_retryable());
        assert!(PipelineError::transport_unreachable("refused").is_retryable());

        assert!(!PipelineError::query_failed("syntax").is_retryable());
        assert!(!PipelineError::AuthenticationFailed("535".into()).is_retryable());
        assert!(!PipelineError::InvalidRecipients("bad".into()).is_retryable());
        assert!(!PipelineError::send_failed("550").is_retryable());
    }

    #[test]
    fn test_timeouts_are_retryable() {
        let err = PipelineError::QueryFailed {
            message: "query exceeded 60s".into(),
            timed_out: true,
        };
        assert!(err.is_timeout());
        assert!(err.is_retryable());

        let err = PipelineError::SendFailed {
            message: "DATA timed out".into(),
            timed_out: true,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_run_failure_display_names_stage() {
        let failure = RunFailure::new(
            Stage::Compose,
            PipelineError::AttachmentUnavailable {
                path: PathBuf::from("/tmp/report.csv"),
                reason: "not found".into(),
            },
        );
        let text = failure.to_string();
        assert!(text.starts_with("compose stage failed"));
        assert!(text.contains("/tmp/report.csv"));
        assert_eq!(failure.error.kind(), ErrorKind::AttachmentUnavailable);
    }
}
