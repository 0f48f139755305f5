//! OpenSSH client config lookup for host aliases
//!
//! Only the keywords needed to open a session are interpreted: `Hostname`,
//! `User`, `IdentityFile`, `Port` and `ConnectTimeout`. Everything else is
//! ignored. As in `ssh(1)`, the first value obtained for a keyword wins.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::ExecError;

/// Settings collected for one alias
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasEntry {
    /// `Hostname`
    pub hostname: Option<String>,
    /// `User`
    pub user: Option<String>,
    /// `IdentityFile`, unexpanded
    pub identity_file: Option<String>,
    /// `Port`
    pub port: Option<u16>,
    /// `ConnectTimeout`
    pub connect_timeout: Option<Duration>,
}

/// Read `path` and collect the settings that apply to `alias`
///
/// # Errors
/// Returns `ExecError::LocalFileNotFound` if the file is missing and
/// `ExecError::Configuration` if it cannot be read or holds invalid values
pub fn load_alias(path: &Path, alias: &str) -> Result<AliasEntry, ExecError> {
    if !path.is_file() {
        return Err(ExecError::LocalFileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ExecError::Configuration(format!("{}: {e}", path.display())))?;

    debug!(path = %path.display(), alias, "parsing SSH config");
    parse_alias(&content, alias)
}

/// Collect the settings that apply to `alias` from config text
///
/// # Errors
/// Returns `ExecError::Configuration` for unparsable `Port` or
/// `ConnectTimeout` values in a matching block
pub fn parse_alias(content: &str, alias: &str) -> Result<AliasEntry, ExecError> {
    let mut entry = AliasEntry::default();
    // lines before the first Host block apply to every host
    let mut active = true;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((keyword, value)) = split_keyword(line) else {
            continue;
        };

        match keyword.as_str() {
            "host" => {
                active = host_matches(alias, value);
                continue;
            }
            "match" => {
                active = false;
                continue;
            }
            _ => {}
        }

        if !active {
            continue;
        }

        match keyword.as_str() {
            "hostname" if entry.hostname.is_none() => {
                entry.hostname = Some(value.replace("%h", alias));
            }
            "user" if entry.user.is_none() => entry.user = Some(value.to_string()),
            "identityfile" if entry.identity_file.is_none() => {
                entry.identity_file = Some(value.to_string());
            }
            "port" if entry.port.is_none() => {
                let port = value.parse::<u16>().map_err(|_| {
                    ExecError::Configuration(format!("invalid port '{value}' for host {alias}"))
                })?;
                entry.port = Some(port);
            }
            "connecttimeout" if entry.connect_timeout.is_none() => {
                let secs = value.parse::<u64>().map_err(|_| {
                    ExecError::Configuration(format!(
                        "invalid connect timeout '{value}' for host {alias}"
                    ))
                })?;
                entry.connect_timeout = Some(Duration::from_secs(secs));
            }
            _ => {}
        }
    }

    Ok(entry)
}

/// Split `Keyword value` or `Keyword=value`, lowercasing the keyword
fn split_keyword(line: &str) -> Option<(String, &str)> {
    let end = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let keyword = line[..end].to_ascii_lowercase();

    let rest = line[end..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim();
    let value = rest
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(rest);

    if value.is_empty() {
        return None;
    }

    Some((keyword, value))
}

/// Evaluate a `Host` pattern list against `alias`
fn host_matches(alias: &str, patterns: &str) -> bool {
    let mut matched = false;

    for pattern in patterns.split_whitespace() {
        if let Some(negated) = pattern.strip_prefix('!') {
            if glob_match(negated.as_bytes(), alias.as_bytes()) {
                return false;
            }
        } else if glob_match(pattern.as_bytes(), alias.as_bytes()) {
            matched = true;
        }
    }

    matched
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p.eq_ignore_ascii_case(t) => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}
