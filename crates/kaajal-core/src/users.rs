//! Remote account creation

use std::path::Path;

use kaajal_exec::ExecOptions;
use kaajal_exec::keys::ensure_local_file;
use tracing::{info, instrument, warn};

use crate::credentials::{GITHUB_TOKEN, SSH_KEY, Target};
use crate::error::{ProvisionError, ProvisionResult, Report};
use crate::profile::{HostProfile, remote_failure};
use crate::shell::is_valid_username;

/// GECOS comment set on created accounts
pub const ACCOUNT_COMMENT: &str = "Created by kaajal";

impl HostProfile {
    /// Create `user` with a home directory and bash shell, then set its
    /// password and deploy its credentials
    ///
    /// Empty strings count as absent. Steps run in order and the first
    /// failing step aborts; earlier steps are not undone.
    ///
    /// # Errors
    /// Returns `Precondition` when not connected or not privileged,
    /// `Configuration` for a missing or invalid user name or when neither a
    /// password nor a key is given, `LocalFileNotFound` for a missing key or
    /// token file, `AlreadyExists` if the account is present, and
    /// `RemoteCommand` for a failing `useradd`, `chpasswd` or deployment
    #[instrument(skip(self, password))]
    pub async fn create_new_user(
        &self,
        user: &str,
        password: Option<&str>,
        ssh_key: Option<&Path>,
        github_token: Option<&Path>,
    ) -> ProvisionResult {
        self.require_connected()?;
        self.require_privilege()?;

        let user = user.trim();
        if user.is_empty() {
            return Err(ProvisionError::Configuration("user name is required".to_string()));
        }
        if !is_valid_username(user) {
            return Err(ProvisionError::Configuration(format!("invalid user name '{user}'")));
        }

        let password = password.filter(|p| !p.is_empty());
        // chpasswd reads one name:password pair per line
        if password.is_some_and(|p| p.contains(['\n', '\r'])) {
            return Err(ProvisionError::Configuration(
                "password must not contain line breaks".to_string(),
            ));
        }
        let ssh_key = ssh_key.filter(|p| !p.as_os_str().is_empty());
        let github_token = github_token.filter(|p| !p.as_os_str().is_empty());

        if password.is_none() && ssh_key.is_none() {
            return Err(ProvisionError::Configuration(
                "a password or an SSH key is required to create a user".to_string(),
            ));
        }
        for path in ssh_key.iter().chain(github_token.iter()) {
            ensure_local_file(path)?;
        }

        let existing = self.executor.run(&format!("id {user}")).await?;
        if existing.success() {
            warn!(user, "user already exists");
            return Err(ProvisionError::AlreadyExists(user.to_string()));
        }

        let prefix = self.sudo_prefix();
        let useradd = format!(
            "{prefix}useradd -m -d /home/{user} -s /bin/bash -c \"{ACCOUNT_COMMENT}\" {user}"
        );
        let result = self.executor.run(&useradd).await?;
        if !result.success() {
            return Err(remote_failure(&result, "useradd"));
        }
        info!(user, "created user");

        let mut report = Report::ok();

        if let Some(password) = password {
            let options = ExecOptions::with_stdin(format!("{user}:{password}\n"));
            let result = self
                .executor
                .exec(&format!("{prefix}chpasswd"), &options)
                .await?;
            if !result.success() {
                return Err(remote_failure(&result, "chpasswd"));
            }
            info!(user, "password set");
        }

        if let Some(key) = ssh_key {
            report = report.merge(self.deploy(&SSH_KEY, key, Target::Named(user)).await?);
        }

        if let Some(token) = github_token {
            report = report.merge(
                self.deploy(&GITHUB_TOKEN, token, Target::Named(user))
                    .await?,
            );
        }

        Ok(report)
    }
}
