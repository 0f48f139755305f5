//! Local credential file checks

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ExecError;

/// Expand a leading `~` to the local user's home directory
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolve a local file path and check that it exists
///
/// # Errors
/// Returns `ExecError::LocalFileNotFound` if the file does not exist
pub fn ensure_local_file(path: &Path) -> Result<PathBuf, ExecError> {
    let expanded = expand_tilde(path);

    if !expanded.is_file() {
        return Err(ExecError::LocalFileNotFound(expanded));
    }

    debug!(path = %expanded.display(), "found local file");
    Ok(expanded)
}

/// Resolve a private key path, warning when its permissions are too open
///
/// # Errors
/// Returns `ExecError::LocalFileNotFound` if the key file does not exist
pub fn resolve_private_key(path: &Path) -> Result<PathBuf, ExecError> {
    let key_path = ensure_local_file(path)?;
    check_key_permissions(&key_path);
    Ok(key_path)
}

#[cfg(unix)]
fn check_key_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(metadata) = std::fs::metadata(path) else {
        return;
    };

    // group and other bits
    if metadata.permissions().mode() & 0o77 != 0 {
        warn!(path = %path.display(), "private key permissions too open (should be 600)");
    }
}

#[cfg(not(unix))]
fn check_key_permissions(_path: &Path) {}
