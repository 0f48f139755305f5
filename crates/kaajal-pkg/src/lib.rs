//! kaajal-pkg: Package manager abstraction
//!
//! Builds the update, install and proxy commands for the package managers
//! kaajal supports (apt-get, dnf) and runs them through a
//! [`kaajal_exec::RemoteExecutor`].

use std::sync::Arc;

use kaajal_exec::RemoteExecutor;

pub mod apt;
pub mod dnf;
pub mod error;
pub mod traits;
pub mod types;

#[cfg(test)]
mod mock;

pub use apt::AptManager;
pub use dnf::DnfManager;
pub use error::PackageError;
pub use traits::PackageManager;
pub use types::{PackageManagerType, ProxySettings, UpdateResult};

/// Create the package manager implementation for `kind`
pub fn manager_for(
    kind: PackageManagerType,
    executor: Arc<dyn RemoteExecutor>,
    use_sudo: bool,
) -> Box<dyn PackageManager> {
    match kind {
        PackageManagerType::AptGet => Box::new(AptManager::new(executor, use_sudo)),
        PackageManagerType::Dnf => Box::new(DnfManager::new(executor, use_sudo)),
    }
}
