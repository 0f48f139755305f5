//! `HostProfile`: what was learned about the host and how to act on it

use std::sync::Arc;

use kaajal_exec::RemoteExecutor;
use kaajal_pkg::{PackageManager, PackageManagerType, ProxySettings, manager_for};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{ProvisionError, ProvisionResult, Report};
use crate::os_release::OsRelease;

/// Warning returned by `identify` when sudo needs a password
pub const NO_PASSWORDLESS_SUDO: &str = "User can NOT run sudo without password";

/// Remote file identifying the distribution
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Privilege level of a non-root session user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// No passwordless sudo (or not checked yet)
    #[default]
    Unprivileged,
    /// `sudo -n` succeeds
    PasswordlessSudo,
}

/// Facts gathered by [`HostProfile::identify`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFacts {
    /// Distribution `ID`
    pub id: String,
    /// Distribution `NAME`
    pub name: String,
    /// Distribution `PRETTY_NAME`
    pub pretty_name: String,
    /// Package manager, `None` for unsupported distributions
    pub package_manager: Option<PackageManagerType>,
    /// Numeric uid of the session user, empty until identified
    pub remote_uid: String,
    /// Sudo eligibility of the session user
    pub privilege: Privilege,
}

impl HostFacts {
    /// Whether the session user is root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.remote_uid == "0"
    }

    /// Root or passwordless sudo
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.is_root() || self.privilege == Privilege::PasswordlessSudo
    }
}

/// Per-connection record of the host plus the provisioning operations
///
/// Facts are filled by [`HostProfile::identify`] and reused by every later
/// operation. Each operation re-checks the connection and, where needed,
/// privilege before issuing any remote command.
pub struct HostProfile {
    pub(crate) executor: Arc<dyn RemoteExecutor>,
    pub(crate) proxy: ProxySettings,
    pub(crate) facts: HostFacts,
}

impl std::fmt::Debug for HostProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostProfile")
            .field("executor", &self.executor.executor_type())
            .field("facts", &self.facts)
            .finish_non_exhaustive()
    }
}

impl HostProfile {
    /// Create an unidentified profile on top of `executor`
    ///
    /// Proxy settings are read from the local environment.
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            proxy: ProxySettings::from_env(),
            facts: HostFacts::default(),
        }
    }

    /// Replace the proxy settings applied by [`HostProfile::update`]
    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = proxy;
        self
    }

    /// Facts gathered so far
    #[must_use]
    pub fn facts(&self) -> &HostFacts {
        &self.facts
    }

    /// Distribution `ID`
    #[must_use]
    pub fn id(&self) -> &str {
        &self.facts.id
    }

    /// Distribution `NAME`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.facts.name
    }

    /// Distribution `PRETTY_NAME`
    #[must_use]
    pub fn pretty_name(&self) -> &str {
        &self.facts.pretty_name
    }

    /// Detected package manager
    #[must_use]
    pub fn package_manager(&self) -> Option<PackageManagerType> {
        self.facts.package_manager
    }

    /// Numeric uid of the session user
    #[must_use]
    pub fn remote_uid(&self) -> &str {
        &self.facts.remote_uid
    }

    /// Sudo eligibility of the session user
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        self.facts.privilege
    }

    /// Identify distribution, package manager and privilege
    ///
    /// A session user without passwordless sudo is not an error: the call
    /// completes and returns [`NO_PASSWORDLESS_SUDO`] as a warning.
    ///
    /// # Errors
    /// Returns `Precondition` when not connected and `RemoteCommand` when
    /// `/etc/os-release` or `id -u` cannot be read
    #[instrument(skip(self))]
    pub async fn identify(&mut self) -> ProvisionResult {
        self.require_connected()?;
        self.facts = HostFacts::default();

        let release = self
            .executor
            .run(&format!("cat {OS_RELEASE_PATH}"))
            .await?;
        if !release.success() {
            warn!(stderr = %release.error_text(), "failed to read {OS_RELEASE_PATH}");
            return Err(remote_failure(&release, OS_RELEASE_PATH));
        }

        let os = OsRelease::parse(&release.stdout);
        self.facts.package_manager = PackageManagerType::from_distro_id(&os.id);
        if self.facts.package_manager.is_none() {
            warn!(id = %os.id, "no supported package manager for distribution");
        }
        self.facts.id = os.id;
        self.facts.name = os.name;
        self.facts.pretty_name = os.pretty_name;

        let uid = self.executor.run("id -u").await?;
        if !uid.success() {
            return Err(remote_failure(&uid, "id -u"));
        }
        self.facts.remote_uid = uid.stdout.trim().to_string();

        let mut report = Report::ok();
        if !self.facts.is_root() {
            let sudo = self.executor.run("sudo -n true").await?;
            if sudo.success() {
                self.facts.privilege = Privilege::PasswordlessSudo;
            } else {
                warn!(uid = %self.facts.remote_uid, "{NO_PASSWORDLESS_SUDO}");
                report = Report::warning(NO_PASSWORDLESS_SUDO);
            }
        }

        info!(
            pretty_name = %self.facts.pretty_name,
            package_manager = ?self.facts.package_manager,
            uid = %self.facts.remote_uid,
            privilege = ?self.facts.privilege,
            "identified host"
        );

        Ok(report)
    }

    pub(crate) fn require_connected(&self) -> Result<(), ProvisionError> {
        if self.executor.is_connected() {
            Ok(())
        } else {
            Err(ProvisionError::not_connected())
        }
    }

    pub(crate) fn require_privilege(&self) -> Result<(), ProvisionError> {
        if self.facts.is_privileged() {
            Ok(())
        } else {
            Err(ProvisionError::Precondition(
                "insufficient privilege: root or passwordless sudo required".to_string(),
            ))
        }
    }

    /// Connected, privileged and on a supported distribution
    pub(crate) fn require_package_manager(&self) -> Result<Box<dyn PackageManager>, ProvisionError> {
        self.require_connected()?;
        self.require_privilege()?;

        let kind = self.facts.package_manager.ok_or_else(|| {
            ProvisionError::Precondition(format!(
                "unknown package manager for distribution '{}'",
                self.facts.id
            ))
        })?;

        Ok(manager_for(kind, self.executor.clone(), self.use_sudo()))
    }

    pub(crate) fn use_sudo(&self) -> bool {
        !self.facts.is_root()
    }

    /// `"sudo "` for non-root sessions, empty for root
    pub(crate) fn sudo_prefix(&self) -> &'static str {
        if self.use_sudo() { "sudo " } else { "" }
    }
}

/// Error for a remote command that exited non-zero
pub(crate) fn remote_failure(result: &kaajal_exec::CommandResult, what: &str) -> ProvisionError {
    ProvisionError::RemoteCommand(failure_text(result, what))
}

/// Trimmed stderr, or the exit status when stderr is empty
pub(crate) fn failure_text(result: &kaajal_exec::CommandResult, what: &str) -> String {
    let text = result.error_text();
    if text.is_empty() {
        format!("{what} exited with status {}", result.status)
    } else {
        text.to_string()
    }
}
