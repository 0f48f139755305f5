//! Interactive connection setup when no connection type is configured

use std::path::PathBuf;

use dialoguer::{Input, Password, Select};
use eyre::{WrapErr, eyre};
use kaajal_exec::ConnectionType;

use crate::config::ConnectionSettings;

/// Menu entries, in [`CONNECTION_TYPES`] order
const MENU: [&str; 3] = [
    "User     (user, password, host)",
    "SSH key  (user, SSH key, host)",
    "SSH host (SSH config, SSH host)",
];

const CONNECTION_TYPES: [ConnectionType; 3] = [
    ConnectionType::User,
    ConnectionType::SshKey,
    ConnectionType::SshHost,
];

/// Source of answers for the connection questions
pub trait Prompter {
    /// Index of the chosen item
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> eyre::Result<usize>;

    /// Free text, pre-filled with `default` when given
    fn input(&mut self, prompt: &str, default: Option<String>) -> eyre::Result<String>;

    /// Hidden text
    fn password(&mut self, prompt: &str) -> eyre::Result<String>;
}

/// Prompts on the controlling terminal
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> eyre::Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .wrap_err("connection type selection")
    }

    fn input(&mut self, prompt: &str, default: Option<String>) -> eyre::Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default);
        }
        input.interact_text().wrap_err_with(|| prompt.to_string())
    }

    fn password(&mut self, prompt: &str) -> eyre::Result<String> {
        Password::new()
            .with_prompt(prompt)
            .interact()
            .wrap_err_with(|| prompt.to_string())
    }
}

/// Make sure a connection type is set, asking for it on a terminal
///
/// # Errors
/// Returns error if no type is set and `interactive` is false, or if a
/// prompt cannot be read
pub fn ensure_connection_type(
    settings: &mut ConnectionSettings,
    interactive: bool,
    prompter: &mut impl Prompter,
) -> eyre::Result<()> {
    if settings.connection_type.is_some() {
        return Ok(());
    }

    if !interactive {
        return Err(eyre!(
            "no connection type set; use --connection-type or the config file"
        ));
    }

    ask_for_parameters(settings, prompter)
}

/// Ask for the connection type and the fields it needs
///
/// Known values are offered as defaults. A password that is already set is
/// not asked for again.
///
/// # Errors
/// Returns error if a prompt cannot be read
pub fn ask_for_parameters(
    settings: &mut ConnectionSettings,
    prompter: &mut impl Prompter,
) -> eyre::Result<()> {
    let choice = prompter.select("Connection type", &MENU, 0)?;
    let kind = *CONNECTION_TYPES
        .get(choice)
        .ok_or_else(|| eyre!("invalid connection type choice {choice}"))?;

    match kind {
        ConnectionType::User => {
            settings.user = Some(prompter.input("Username", settings.user.clone())?);
            if settings.password.as_deref().is_none_or(str::is_empty) {
                settings.password = Some(prompter.password("Password")?);
            }
            settings.host = Some(prompter.input("Host", settings.host.clone())?);
        }
        ConnectionType::SshKey => {
            settings.user = Some(prompter.input("Username", settings.user.clone())?);
            settings.host = Some(prompter.input("Host", settings.host.clone())?);
            let key = prompter.input("Path to SSH key", path_default(&settings.ssh_key))?;
            settings.ssh_key = Some(PathBuf::from(key));
        }
        ConnectionType::SshHost => {
            let config = prompter.input("Path to SSH config", path_default(&settings.ssh_config))?;
            settings.ssh_config = Some(PathBuf::from(config));
            settings.ssh_config_host = Some(
                prompter.input("Host alias in SSH config", settings.ssh_config_host.clone())?,
            );
        }
    }

    settings.connection_type = Some(kind);
    Ok(())
}

fn path_default(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.display().to_string())
}
