//! Error types for kaajal-exec

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while connecting to or executing on the remote host
///
/// This is the only failure type that leaves the transport; `russh` errors
/// are mapped onto it inside [`crate::ssh`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// A field required by the active connection variant is missing
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A local file the connection depends on does not exist
    #[error("{}: file not found", .0.display())]
    LocalFileNotFound(PathBuf),

    /// Socket-level failure or connect timeout
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication rejected by the server
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server host key did not match `known_hosts`
    #[error("host key verification failed: {0}")]
    HostKeyRejected(String),

    /// SSH protocol failure
    #[error("SSH protocol error: {0}")]
    Protocol(String),

    /// Connection not established
    #[error("not connected")]
    NotConnected,

    /// `connect` called on a live session
    #[error("already connected")]
    AlreadyConnected,

    /// `exec` called without a command
    #[error("empty command")]
    EmptyCommand,

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),
}
