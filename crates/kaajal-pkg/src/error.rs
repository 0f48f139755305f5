//! Error types for kaajal-pkg

use kaajal_exec::ExecError;
use thiserror::Error;

/// Errors that can occur during package operations
///
/// Non-zero exits of package manager commands are not errors; they are
/// reported through [`crate::types::UpdateResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// Execution error from remote executor
    #[error("execution error: {0}")]
    ExecutionError(#[from] ExecError),
}
