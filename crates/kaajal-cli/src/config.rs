//! Configuration loading and types

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use kaajal_exec::{ConnectionConfig, ConnectionType};
use serde::{Deserialize, Serialize};

/// Log level used when neither `RUST_LOG`, a flag nor the file sets one
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Top-level configuration of the kaajal CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// How to reach the host
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Logging
    #[serde(default)]
    pub log: LogSettings,
}

/// Connection fields; any of them may be missing until connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Never read from or written to the file
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_config: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_config_host: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl Settings {
    /// `<config dir>/kaajal/kaajal.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kaajal/kaajal.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(settings)
    }

    /// Load `path` if it exists
    ///
    /// # Errors
    /// Returns error if an existing file cannot be read or parsed
    pub fn load_optional(path: &Path) -> eyre::Result<Option<Self>> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Write the settings to `path`, creating its directory
    ///
    /// The password is skipped.
    ///
    /// # Errors
    /// Returns error if the directory or file cannot be written
    pub fn save(&self, path: &Path) -> eyre::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Effective log level
    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

impl ConnectionSettings {
    /// Replace every field that `overrides` sets
    pub fn merge(&mut self, overrides: ConnectionSettings) {
        let ConnectionSettings {
            connection_type,
            user,
            password,
            host,
            ssh_key,
            ssh_config,
            ssh_config_host,
        } = overrides;

        self.connection_type = connection_type.or(self.connection_type);
        self.user = user.or(self.user.take());
        self.password = password.or(self.password.take());
        self.host = host.or(self.host.take());
        self.ssh_key = ssh_key.or(self.ssh_key.take());
        self.ssh_config = ssh_config.or(self.ssh_config.take());
        self.ssh_config_host = ssh_config_host.or(self.ssh_config_host.take());
    }

    /// Build the connection variant selected by `connection_type`
    ///
    /// Missing fields are left empty; the transport reports them when
    /// connecting.
    ///
    /// # Errors
    /// Returns error if no connection type is set
    pub fn to_connection_config(&self) -> eyre::Result<ConnectionConfig> {
        let kind = self.connection_type.ok_or_else(|| {
            eyre::eyre!("no connection type set; use --connection-type or the config file")
        })?;

        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let path = |value: &Option<PathBuf>| value.clone().unwrap_or_default();

        Ok(match kind {
            ConnectionType::User => ConnectionConfig::UserPassword {
                user: text(&self.user),
                password: text(&self.password),
                host: text(&self.host),
            },
            ConnectionType::SshKey => ConnectionConfig::SshKey {
                user: text(&self.user),
                host: text(&self.host),
                key_path: path(&self.ssh_key),
            },
            ConnectionType::SshHost => ConnectionConfig::SshHostAlias {
                config_path: path(&self.ssh_config),
                alias: text(&self.ssh_config_host),
            },
        })
    }
}
