//! DNF package manager (Fedora/CentOS)

use std::sync::Arc;

use async_trait::async_trait;
use kaajal_exec::{ExecOptions, RemoteExecutor};
use tracing::{debug, info, instrument, warn};

use crate::error::PackageError;
use crate::traits::PackageManager;
use crate::types::{PackageManagerType, ProxySettings, UpdateResult};

/// Main dnf configuration file
pub const DNF_CONF: &str = "/etc/dnf/dnf.conf";

/// DNF package manager implementation
pub struct DnfManager {
    executor: Arc<dyn RemoteExecutor>,
    use_sudo: bool,
}

impl DnfManager {
    /// Create a new DNF manager
    pub fn new(executor: Arc<dyn RemoteExecutor>, use_sudo: bool) -> Self {
        Self { executor, use_sudo }
    }

    /// Build dnf command with optional sudo
    fn pkg_cmd(&self, args: &str) -> String {
        if self.use_sudo {
            format!("sudo dnf {args}")
        } else {
            format!("dnf {args}")
        }
    }

    fn sudo_cmd(&self, cmd: &str) -> String {
        if self.use_sudo {
            format!("sudo {cmd}")
        } else {
            cmd.to_string()
        }
    }
}

#[async_trait]
impl PackageManager for DnfManager {
    /// `dnf update` refreshes metadata and upgrades in one step
    #[instrument(skip(self))]
    async fn update(&self) -> Result<UpdateResult, PackageError> {
        info!("starting dnf update");

        let result = self.executor.run(&self.pkg_cmd("-y update")).await?;

        let mut outcome = UpdateResult::default();
        outcome.record("dnf update", &result);

        info!(success = outcome.success, "dnf update completed");

        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn install(&self, packages: &str) -> Result<UpdateResult, PackageError> {
        info!("installing packages with dnf");

        let result = self
            .executor
            .run(&self.pkg_cmd(&format!("-y install {packages}")))
            .await?;

        let mut outcome = UpdateResult::default();
        outcome.record("dnf install", &result);

        Ok(outcome)
    }

    #[instrument(skip(self, proxy))]
    async fn configure_proxy(&self, proxy: &ProxySettings) {
        let Some(http) = proxy.http.as_deref() else {
            debug!("no proxy configured");
            return;
        };

        match self.executor.run(&format!("grep -qs '^proxy=' {DNF_CONF}")).await {
            Ok(result) if result.success() => {
                debug!(file = DNF_CONF, "dnf proxy already configured");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to check dnf proxy configuration");
                return;
            }
        }

        // leading newline keeps the directive off an unterminated last line
        let cmd = self.sudo_cmd(&format!("tee -a {DNF_CONF} > /dev/null"));
        let options = ExecOptions::with_stdin(format!("\nproxy={http}\n"));

        match self.executor.exec(&cmd, &options).await {
            Ok(result) if result.success() => info!(file = DNF_CONF, "dnf proxy configured"),
            Ok(result) => warn!(
                status = result.status,
                stderr = %result.error_text(),
                "failed to write dnf proxy configuration"
            ),
            Err(e) => warn!(error = %e, "failed to write dnf proxy configuration"),
        }
    }

    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::Dnf
    }
}
