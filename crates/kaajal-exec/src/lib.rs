//! kaajal-exec: Remote execution over SSH
//!
//! Resolves the three connection variants, owns the authenticated session
//! and runs one command at a time on the provisioned host.

pub mod alias;
pub mod config;
pub mod error;
pub mod keys;
pub mod result;
pub mod ssh;
pub mod traits;

pub use config::{AuthMethod, ConnectTarget, ConnectionConfig, ConnectionType};
pub use error::ExecError;
pub use result::{CommandResult, ExecOptions};
pub use ssh::SshTransport;
pub use traits::RemoteExecutor;
