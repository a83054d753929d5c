//! Error types for webapp management operations.
//!
//! This module defines the error type shared by every operation in the crate.
//! External-command failures carry the diagnostic text captured from the
//! tool's output so callers can surface it verbatim to the panel operator.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing a webapp instance.
///
/// Validation and unsupported-operation errors are raised before any side
/// effect is performed. Command failures are raised after compensating
/// cleanup (where the operation defines one) has already run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Caller-supplied input was rejected before anything ran.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// A required backing service or binary is unavailable.
    #[error("missing prerequisite: {name}")]
    MissingPrerequisite {
        /// The missing service or binary (e.g. "MySQL", "composer").
        name: String,
    },

    /// The operation exists but has no defined path for this instance.
    ///
    /// Raised for cross-epoch upgrades and theme updates. Nothing is
    /// attempted; the message describes why.
    #[error("unsupported operation: {message}")]
    Unsupported {
        /// Why the operation cannot be performed.
        message: String,
    },

    /// An update lock marker is present in the application root.
    #[error("instance is locked - remove lock file from `{app_root}' and try again")]
    Locked {
        /// The application root holding the lock marker.
        app_root: String,
    },

    /// An external command reported failure.
    ///
    /// `detail` is the captured diagnostic text, stderr preferred with
    /// stdout as the fallback.
    #[error("{context}: {detail}")]
    CommandFailed {
        /// What the command was trying to do.
        context: String,
        /// Captured diagnostic text from the tool.
        detail: String,
    },

    /// An external command exceeded the configured timeout.
    #[error("command timed out after {duration:?}")]
    Timeout {
        /// How long the command was allowed to run.
        duration: Duration,
    },

    /// Filesystem operation failed.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured tool output could not be decoded.
    #[error("malformed tool output: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a validation error from anything printable.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a command failure with context and captured diagnostics.
    pub fn command(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CommandFailed {
            context: context.into(),
            detail: detail.into(),
        }
    }
}
