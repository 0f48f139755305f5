//! kaajal-core: Single-host provisioning engine
//!
//! [`HostProfile`] identifies a connected host (distribution, package
//! manager, privilege) and runs the provisioning operations on top of a
//! [`kaajal_exec::RemoteExecutor`]: system update, package install, account
//! creation and credential deployment.

pub mod credentials;
pub mod error;
pub mod os_release;
pub mod packages;
pub mod profile;
mod shell;
pub mod users;

pub use credentials::CURRENT_USER;
pub use error::{ProvisionError, ProvisionResult, Report, outcome_message};
pub use os_release::OsRelease;
pub use packages::collect_packages;
pub use profile::{HostFacts, HostProfile, NO_PASSWORDLESS_SUDO, OS_RELEASE_PATH, Privilege};
pub use users::ACCOUNT_COMMENT;
