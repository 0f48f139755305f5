//! SSH key and GitHub token deployment

use std::path::Path;

use kaajal_exec::ExecOptions;
use kaajal_exec::keys::ensure_local_file;
use tracing::{debug, info, instrument, warn};

use crate::error::{ProvisionError, ProvisionResult, Report};
use crate::profile::{HostProfile, failure_text, remote_failure};
use crate::shell::{is_valid_username, quote};

/// Target user meaning "the authenticated session user"
pub const CURRENT_USER: &str = "current";

/// Account receiving a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target<'a> {
    /// The authenticated session user
    Session,
    /// A named account; needs privilege
    Named(&'a str),
}

impl<'a> Target<'a> {
    /// Map the public `user` argument, where [`CURRENT_USER`] means the session
    fn from_user(user: &'a str) -> Self {
        if user == CURRENT_USER {
            Target::Session
        } else {
            Target::Named(user)
        }
    }
}

/// Where a credential lands below the target's home directory
pub(crate) struct Deployment {
    what: &'static str,
    /// Directory relative to home, created with mode 700
    dir: &'static str,
    file: &'static str,
    /// Append instead of overwrite
    append: bool,
}

pub(crate) const SSH_KEY: Deployment = Deployment {
    what: "SSH key",
    dir: ".ssh",
    file: "authorized_keys",
    append: true,
};

pub(crate) const GITHUB_TOKEN: Deployment = Deployment {
    what: "GitHub token",
    dir: ".config/github",
    file: "token",
    append: false,
};

impl HostProfile {
    /// Append the public key at `path` to `user`'s `authorized_keys`
    ///
    /// `user` is [`CURRENT_USER`] for the session user; any other name
    /// requires privilege and gets the `.ssh` directory chowned to it.
    ///
    /// # Errors
    /// Returns `Precondition`, `LocalFileNotFound` before any remote
    /// command, and `RemoteCommand` if the home lookup, directory creation
    /// or append fails
    #[instrument(skip(self))]
    pub async fn copy_ssh_key(&self, path: &Path, user: &str) -> ProvisionResult {
        self.deploy(&SSH_KEY, path, Target::from_user(user)).await
    }

    /// Write the token at `path` to `user`'s `~/.config/github/token`
    ///
    /// The token file is overwritten. Same user and privilege rules as
    /// [`HostProfile::copy_ssh_key`].
    ///
    /// # Errors
    /// As for [`HostProfile::copy_ssh_key`]
    #[instrument(skip(self))]
    pub async fn copy_github_token(&self, path: &Path, user: &str) -> ProvisionResult {
        self.deploy(&GITHUB_TOKEN, path, Target::from_user(user)).await
    }

    pub(crate) async fn deploy(
        &self,
        deployment: &Deployment,
        path: &Path,
        target: Target<'_>,
    ) -> ProvisionResult {
        self.require_connected()?;

        let other_user = match target {
            Target::Session => None,
            Target::Named(name) => Some(name),
        };
        if let Some(name) = other_user {
            self.require_privilege()?;
            if !is_valid_username(name) {
                return Err(ProvisionError::Configuration(format!("invalid user name '{name}'")));
            }
        }

        let local = ensure_local_file(path)?;
        let mut content = std::fs::read_to_string(&local)
            .map_err(|e| ProvisionError::Configuration(format!("{}: {e}", local.display())))?;
        if !content.ends_with('\n') {
            content.push('\n');
        }

        let home = match other_user {
            Some(name) => self.lookup_home(name).await?,
            None => self.session_home().await?,
        };

        let prefix = if other_user.is_some() {
            self.sudo_prefix()
        } else {
            ""
        };
        let dir = format!("{home}/{}", deployment.dir);
        let file = format!("{dir}/{}", deployment.file);

        let mkdir = format!(
            "{prefix}mkdir -p {dir} && {prefix}chmod 700 {dir}",
            dir = quote(&dir)
        );
        let result = self.executor.run(&mkdir).await?;
        if !result.success() {
            warn!(dir = %dir, stderr = %result.error_text(), "failed to create directory");
            return Err(remote_failure(&result, "mkdir"));
        }

        let tee = if deployment.append { "tee -a" } else { "tee" };
        let write = format!(
            "{prefix}{tee} {file} > /dev/null && {prefix}chmod 600 {file}",
            file = quote(&file)
        );
        let result = self
            .executor
            .exec(&write, &ExecOptions::with_stdin(content))
            .await?;
        if !result.success() {
            warn!(file = %file, stderr = %result.error_text(), "failed to write {}", deployment.what);
            return Err(remote_failure(&result, tee));
        }

        let mut report = Report::ok();
        if let Some(name) = other_user {
            report = self.chown(deployment, &home, name).await?;
        }

        info!(file = %file, "deployed {}", deployment.what);
        Ok(report)
    }

    /// Hand the deployed directory, and its parent below home, to `user`
    async fn chown(&self, deployment: &Deployment, home: &str, user: &str) -> ProvisionResult {
        let prefix = self.sudo_prefix();
        let dir = quote(&format!("{home}/{}", deployment.dir));

        let cmd = match deployment.dir.split_once('/') {
            Some((parent, _)) => format!(
                "{prefix}chown {user}: {parent} && {prefix}chown -R {user}: {dir}",
                parent = quote(&format!("{home}/{parent}"))
            ),
            None => format!("{prefix}chown -R {user}: {dir}"),
        };

        let result = self.executor.run(&cmd).await?;
        if result.success() {
            return Ok(Report::ok());
        }

        warn!(user, stderr = %result.error_text(), "failed to change ownership");
        Ok(Report::warning(failure_text(&result, "chown")))
    }

    async fn session_home(&self) -> Result<String, ProvisionError> {
        match self.executor.home_dir().await {
            Some(home) if !home.is_empty() => Ok(home),
            _ => Err(ProvisionError::Precondition(
                "home directory of the session user is unknown".to_string(),
            )),
        }
    }

    async fn lookup_home(&self, user: &str) -> Result<String, ProvisionError> {
        let result = self
            .executor
            .run(&format!("getent passwd {user} | cut -d: -f6"))
            .await?;

        let home = result.stdout.trim();
        if !result.success() || home.is_empty() {
            return Err(ProvisionError::RemoteCommand(format!(
                "home directory of {user} not found"
            )));
        }

        debug!(user, home, "resolved home directory");
        Ok(home.to_string())
    }
}
