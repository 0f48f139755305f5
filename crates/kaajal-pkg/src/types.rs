//! Type definitions for package management

use serde::{Deserialize, Serialize};
use tracing::warn;

use kaajal_exec::CommandResult;

/// Package manager type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageManagerType {
    /// DNF (Fedora/CentOS)
    #[serde(rename = "dnf")]
    Dnf,
    /// apt-get (Debian/Ubuntu)
    #[serde(rename = "apt-get")]
    AptGet,
}

impl PackageManagerType {
    /// Map an `/etc/os-release` `ID` to its package manager
    #[must_use]
    pub fn from_distro_id(id: &str) -> Option<Self> {
        match id {
            "centos" | "fedora" => Some(PackageManagerType::Dnf),
            "debian" | "ubuntu" => Some(PackageManagerType::AptGet),
            _ => None,
        }
    }
}

impl std::fmt::Display for PackageManagerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageManagerType::Dnf => write!(f, "dnf"),
            PackageManagerType::AptGet => write!(f, "apt-get"),
        }
    }
}

/// Result of an update or install run
///
/// Every subcommand is attempted; failures are collected here rather than
/// aborting the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Whether every subcommand exited 0
    pub success: bool,
    /// Last non-empty stderr captured from any subcommand
    pub error: Option<String>,
}

impl Default for UpdateResult {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
        }
    }
}

impl UpdateResult {
    /// Fold one subcommand's result into the run
    pub fn record(&mut self, step: &str, result: &CommandResult) {
        if !result.success() {
            self.success = false;
            warn!(
                step,
                status = result.status,
                stderr = %result.error_text(),
                "package manager command failed"
            );
        }

        let text = result.error_text();
        if !text.is_empty() {
            self.error = Some(text.to_string());
        }
    }
}

/// HTTP(S) proxies to configure on the remote package manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// HTTP proxy URL
    pub http: Option<String>,
    /// HTTPS proxy URL
    pub https: Option<String>,
}

impl ProxySettings {
    /// Read `http_proxy`/`HTTP_PROXY` and `https_proxy`/`HTTPS_PROXY`
    ///
    /// The lower-case variable wins when both are set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |lower: &str, upper: &str| {
            lookup(lower)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| lookup(upper).filter(|v| !v.trim().is_empty()))
                .map(|v| v.trim().to_string())
        };

        Self {
            http: read("http_proxy", "HTTP_PROXY"),
            https: read("https_proxy", "HTTPS_PROXY"),
        }
    }

    /// Set the HTTP proxy
    #[must_use]
    pub fn with_http(mut self, url: impl Into<String>) -> Self {
        self.http = Some(url.into());
        self
    }

    /// Set the HTTPS proxy
    #[must_use]
    pub fn with_https(mut self, url: impl Into<String>) -> Self {
        self.https = Some(url.into());
        self
    }
}
