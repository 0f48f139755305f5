//! Package manager traits

use async_trait::async_trait;

use crate::error::PackageError;
use crate::types::{PackageManagerType, ProxySettings, UpdateResult};

/// Package manager on the provisioned host
///
/// Implementations prefix commands with `sudo` when constructed for a
/// non-root user; callers are responsible for checking privilege first.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Refresh the package index and upgrade installed packages
    ///
    /// A failing subcommand does not stop the following one.
    async fn update(&self) -> Result<UpdateResult, PackageError>;

    /// Install a space-separated package list
    async fn install(&self, packages: &str) -> Result<UpdateResult, PackageError>;

    /// Write a proxy directive into the manager's configuration if none is present
    ///
    /// Best-effort: failures are logged.
    async fn configure_proxy(&self, proxy: &ProxySettings);

    /// Get package manager type
    fn manager_type(&self) -> PackageManagerType;
}
