//! APT package manager (Debian/Ubuntu)

use std::sync::Arc;

use async_trait::async_trait;
use kaajal_exec::{ExecOptions, RemoteExecutor};
use tracing::{debug, info, instrument, warn};

use crate::error::PackageError;
use crate::traits::PackageManager;
use crate::types::{PackageManagerType, ProxySettings, UpdateResult};

/// Drop-in file holding the proxy directives
pub const APT_PROXY_FILE: &str = "/etc/apt/apt.conf.d/95proxies";

/// APT package manager implementation
pub struct AptManager {
    /// Remote executor for running commands
    executor: Arc<dyn RemoteExecutor>,
    /// Whether to use sudo
    use_sudo: bool,
}

impl AptManager {
    /// Create a new APT manager
    ///
    /// # Arguments
    /// * `executor` - Remote executor for running apt-get commands
    /// * `use_sudo` - Whether to prefix commands with sudo
    pub fn new(executor: Arc<dyn RemoteExecutor>, use_sudo: bool) -> Self {
        Self { executor, use_sudo }
    }

    /// Build apt-get command with optional sudo
    fn apt_cmd(&self, args: &str) -> String {
        if self.use_sudo {
            format!("sudo DEBIAN_FRONTEND=noninteractive apt-get {args}")
        } else {
            format!("DEBIAN_FRONTEND=noninteractive apt-get {args}")
        }
    }

    fn sudo_cmd(&self, cmd: &str) -> String {
        if self.use_sudo {
            format!("sudo {cmd}")
        } else {
            cmd.to_string()
        }
    }

    fn proxy_content(http: &str, proxy: &ProxySettings) -> String {
        let mut content = format!("Acquire::http::Proxy \"{http}\";\n");
        if let Some(https) = &proxy.https {
            content.push_str(&format!("Acquire::https::Proxy \"{https}\";\n"));
        }
        content
    }
}

#[async_trait]
impl PackageManager for AptManager {
    #[instrument(skip(self))]
    async fn update(&self) -> Result<UpdateResult, PackageError> {
        info!("refreshing apt package index");

        let mut outcome = UpdateResult::default();

        let refresh = self.executor.run(&self.apt_cmd("update")).await?;
        outcome.record("apt-get update", &refresh);

        // attempted even when the refresh failed
        let upgrade = self.executor.run(&self.apt_cmd("-y upgrade")).await?;
        outcome.record("apt-get upgrade", &upgrade);

        info!(success = outcome.success, "apt upgrade completed");

        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn install(&self, packages: &str) -> Result<UpdateResult, PackageError> {
        info!("installing packages with apt-get");

        let result = self
            .executor
            .run(&self.apt_cmd(&format!("-y install {packages}")))
            .await?;

        let mut outcome = UpdateResult::default();
        outcome.record("apt-get install", &result);

        Ok(outcome)
    }

    #[instrument(skip(self, proxy))]
    async fn configure_proxy(&self, proxy: &ProxySettings) {
        let Some(http) = proxy.http.as_deref() else {
            debug!("no proxy configured");
            return;
        };

        match self.executor.run(&format!("test -s {APT_PROXY_FILE}")).await {
            Ok(result) if result.success() => {
                debug!(file = APT_PROXY_FILE, "apt proxy already configured");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to check apt proxy configuration");
                return;
            }
        }

        let cmd = self.sudo_cmd(&format!("tee {APT_PROXY_FILE} > /dev/null"));
        let options = ExecOptions::with_stdin(Self::proxy_content(http, proxy));

        match self.executor.exec(&cmd, &options).await {
            Ok(result) if result.success() => info!(file = APT_PROXY_FILE, "apt proxy configured"),
            Ok(result) => warn!(
                status = result.status,
                stderr = %result.error_text(),
                "failed to write apt proxy configuration"
            ),
            Err(e) => warn!(error = %e, "failed to write apt proxy configuration"),
        }
    }

    fn manager_type(&self) -> PackageManagerType {
        PackageManagerType::AptGet
    }
}
