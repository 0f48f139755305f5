//! Remote executor trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandResult, ExecOptions};

/// Executes one shell command at a time on the provisioned host
///
/// Implementations must fully capture a command's output before returning,
/// so there is never more than one command in flight.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `cmd` with the given options
    async fn exec(&self, cmd: &str, options: &ExecOptions) -> Result<CommandResult, ExecError>;

    /// Run `cmd` with default options
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.exec(cmd, &ExecOptions::default()).await
    }

    /// Whether a session is currently established
    fn is_connected(&self) -> bool;

    /// Home directory of the authenticated user, if connected
    async fn home_dir(&self) -> Option<String>;

    /// Get executor type name for logging
    fn executor_type(&self) -> &'static str;
}
