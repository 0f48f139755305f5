//! Core error types for kaajal-core

use std::path::PathBuf;

use kaajal_exec::ExecError;
use kaajal_pkg::PackageError;
use thiserror::Error;

/// Errors returned by provisioning operations
///
/// The `Display` text of each variant is the message shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// Missing or invalid input for the requested operation
    #[error("{0}")]
    Configuration(String),

    /// A local key, token, list or config file does not exist
    #[error("{}: file not found", .0.display())]
    LocalFileNotFound(PathBuf),

    /// Connect-time authentication, host key, socket or protocol failure
    #[error("{0}")]
    Transport(String),

    /// Not connected, insufficient privilege or unknown package manager
    #[error("{0}")]
    Precondition(String),

    /// A remote command exited non-zero; holds its stderr
    #[error("{0}")]
    RemoteCommand(String),

    /// The user to create is already present
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// `connect` on a live session
    #[error("already connected")]
    AlreadyConnected,

    /// Nothing to install after merging the inline list and list file
    #[error("No packages provided to install")]
    NoPackages,
}

impl ProvisionError {
    pub(crate) fn not_connected() -> Self {
        ProvisionError::Precondition("not connected".to_string())
    }
}

impl From<ExecError> for ProvisionError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Configuration(msg) => ProvisionError::Configuration(msg),
            ExecError::LocalFileNotFound(path) => ProvisionError::LocalFileNotFound(path),
            ExecError::NotConnected => ProvisionError::not_connected(),
            ExecError::AlreadyConnected => ProvisionError::AlreadyConnected,
            ExecError::EmptyCommand => ProvisionError::Precondition(e.to_string()),
            ExecError::ConnectionFailed(_)
            | ExecError::AuthenticationFailed(_)
            | ExecError::HostKeyRejected(_)
            | ExecError::Protocol(_)
            | ExecError::IoError(_) => ProvisionError::Transport(e.to_string()),
        }
    }
}

impl From<PackageError> for ProvisionError {
    fn from(e: PackageError) -> Self {
        match e {
            PackageError::ExecutionError(e) => e.into(),
        }
    }
}

/// Non-fatal outcome of a provisioning operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Report {
    /// Warning text for the caller; the operation itself completed
    pub warning: Option<String>,
}

impl Report {
    /// Completed without warnings
    pub fn ok() -> Self {
        Self::default()
    }

    /// Completed with a warning; empty text counts as no warning
    pub fn warning(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            warning: (!text.trim().is_empty()).then_some(text),
        }
    }

    /// Keep the later warning, if any
    pub fn merge(self, later: Report) -> Self {
        Self {
            warning: later.warning.or(self.warning),
        }
    }

    /// Warning text, empty when there is none
    #[must_use]
    pub fn message(&self) -> &str {
        self.warning.as_deref().unwrap_or("")
    }
}

/// Result of every provisioning operation
pub type ProvisionResult = Result<Report, ProvisionError>;

/// Flatten an operation result into a single message; empty means success
#[must_use]
pub fn outcome_message(result: &ProvisionResult) -> String {
    match result {
        Ok(report) => report.message().to_string(),
        Err(e) => e.to_string(),
    }
}
