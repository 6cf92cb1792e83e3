//! @acp:module "Errors"
//! @acp:summary "Failure taxonomy for the version-gate pipeline"
//! @acp:domain cli
//! @acp:layer model
//!
//! Every variant is recoverable by retrying on the next scheduled run.
//! [`GateError::kind`] gives a stable identifier for alerting.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// @acp:summary "Errors raised by the pipeline components"
#[derive(Debug, Error)]
pub enum GateError {
    /// Transport, auth, status or timeout failure talking to the source
    #[error("support-status source unavailable ({url}): {cause}")]
    SourceUnavailable { url: String, cause: String },

    /// Response could not be turned into version tokens
    #[error("support-status source returned an unusable response: {0}")]
    SourceFormat(String),

    /// Parsed response held no supported versions
    #[error("support-status source reported no supported versions ({origin})")]
    EmptyResult { origin: String },

    /// The artifact to patch does not exist
    #[error("constraint file not found: {}", path.display())]
    WriteTargetMissing { path: PathBuf },

    /// The validation block could not be located or parsed safely
    #[error("cannot patch {}: {reason}", path.display())]
    MalformedTarget { path: PathBuf, reason: String },

    /// The remote moved since the artifact was read
    #[error("publish conflict: {0}")]
    PublishConflict(String),

    /// The remote could not be reached or refused for a reason other than divergence
    #[error("publish failed: {0}")]
    PublishUnavailable(String),

    /// Another run holds the run lock
    #[error("another run is in progress (lock file {})", lock.display())]
    RunInProgress { lock: PathBuf },

    /// Run aborted at a step boundary
    #[error("run cancelled before {step}")]
    Cancelled { step: &'static str },

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// @acp:summary "Stable, machine-readable error classification"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    SourceFormatError,
    EmptyResultError,
    WriteTargetMissing,
    MalformedTarget,
    PublishConflict,
    PublishUnavailable,
    RunInProgress,
    Cancelled,
    Config,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::SourceFormatError => "source_format_error",
            ErrorKind::EmptyResultError => "empty_result_error",
            ErrorKind::WriteTargetMissing => "write_target_missing",
            ErrorKind::MalformedTarget => "malformed_target",
            ErrorKind::PublishConflict => "publish_conflict",
            ErrorKind::PublishUnavailable => "publish_unavailable",
            ErrorKind::RunInProgress => "run_in_progress",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GateError {
    /// @acp:summary "Classify the error for reporting"
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            GateError::SourceFormat(_) => ErrorKind::SourceFormatError,
            GateError::EmptyResult { .. } => ErrorKind::EmptyResultError,
            GateError::WriteTargetMissing { .. } => ErrorKind::WriteTargetMissing,
            GateError::MalformedTarget { .. } => ErrorKind::MalformedTarget,
            GateError::PublishConflict(_) => ErrorKind::PublishConflict,
            GateError::PublishUnavailable(_) => ErrorKind::PublishUnavailable,
            GateError::RunInProgress { .. } => ErrorKind::RunInProgress,
            GateError::Cancelled { .. } => ErrorKind::Cancelled,
            GateError::Config(_) => ErrorKind::Config,
            GateError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GateError::MalformedTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        let err = GateError::EmptyResult {
            origin: "test".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::EmptyResultError);
        assert_eq!(err.kind().to_string(), "empty_result_error");
        assert_eq!(
            serde_json::to_string(&ErrorKind::PublishConflict).unwrap(),
            "\"publish_conflict\""
        );
    }

    #[test]
    fn test_display_includes_cause() {
        let err = GateError::SourceUnavailable {
            url: "http://localhost:1".to_string(),
            cause: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("http://localhost:1"));
        assert!(msg.contains("connection refused"));
    }
}
