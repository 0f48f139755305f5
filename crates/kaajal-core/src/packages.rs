//! System update and package installation

use std::path::Path;

use kaajal_exec::keys::ensure_local_file;
use tracing::{info, instrument, warn};

use crate::error::{ProvisionError, ProvisionResult, Report};
use crate::profile::HostProfile;

impl HostProfile {
    /// Configure the package manager proxy, then refresh and upgrade
    ///
    /// Subcommand failures do not stop the run; the last captured error text
    /// is returned as a warning.
    ///
    /// # Errors
    /// Returns `Precondition` when not connected, not privileged or on an
    /// unsupported distribution, and `Transport` if a command cannot be sent
    #[instrument(skip(self))]
    pub async fn update(&self) -> ProvisionResult {
        let manager = self.require_package_manager()?;

        manager.configure_proxy(&self.proxy).await;

        let outcome = manager.update().await?;
        if !outcome.success {
            warn!(manager = %manager.manager_type(), "update finished with errors");
        }

        Ok(outcome.error.map(Report::warning).unwrap_or_default())
    }

    /// Install the inline package list plus the entries of `list_file`
    ///
    /// A non-zero exit of the install command is returned as a warning
    /// carrying its stderr.
    ///
    /// # Errors
    /// Returns `Precondition` as for [`HostProfile::update`],
    /// `LocalFileNotFound` for a missing list file and `NoPackages` when the
    /// merged list is empty; no remote command is issued in those cases
    #[instrument(skip(self))]
    pub async fn install(&self, inline: &str, list_file: Option<&Path>) -> ProvisionResult {
        let manager = self.require_package_manager()?;

        let packages = collect_packages(inline, list_file)?;
        if packages.trim().is_empty() {
            return Err(ProvisionError::NoPackages);
        }

        info!(packages = %packages.trim(), "installing packages");

        let outcome = manager.install(&packages).await?;
        if !outcome.success {
            warn!(manager = %manager.manager_type(), "install finished with errors");
        }

        Ok(outcome.error.map(Report::warning).unwrap_or_default())
    }
}

/// Merge the inline list with a package list file
///
/// Blank lines and `#` comments in the file are skipped; every file entry
/// is appended followed by a single space.
///
/// # Errors
/// Returns `LocalFileNotFound` if `list_file` does not exist and
/// `Configuration` if it cannot be read
pub fn collect_packages(inline: &str, list_file: Option<&Path>) -> Result<String, ProvisionError> {
    let mut packages = inline.trim().to_string();
    if !packages.is_empty() {
        packages.push(' ');
    }

    let Some(path) = list_file.filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(packages);
    };

    let path = ensure_local_file(path)?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ProvisionError::Configuration(format!("{}: {e}", path.display())))?;

    for line in content.lines() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        packages.push_str(entry);
        packages.push(' ');
    }

    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_inline_only() {
        assert_eq!(collect_packages(" git tmux ", None).unwrap(), "git tmux ");
        assert_eq!(collect_packages("", None).unwrap(), "");
    }

    #[test]
    fn test_collect_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("packages.txt");
        std::fs::write(&list, "# comment\n\ngit\ntmux\n").unwrap();

        assert_eq!(collect_packages("", Some(&list)).unwrap(), "git tmux ");
        assert_eq!(
            collect_packages("vim", Some(&list)).unwrap(),
            "vim git tmux "
        );
    }

    #[test]
    fn test_collect_only_comments() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("packages.txt");
        std::fs::write(&list, "# nothing\n   \n  # still nothing\n").unwrap();

        assert!(collect_packages("", Some(&list)).unwrap().trim().is_empty());
    }

    #[test]
    fn test_collect_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("absent.txt");

        assert_eq!(
            collect_packages("git", Some(&list)).unwrap_err(),
            ProvisionError::LocalFileNotFound(list)
        );
    }
}
