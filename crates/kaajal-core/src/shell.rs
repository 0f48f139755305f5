//! Helpers for composing remote shell commands

/// Quote `value` for `sh` unless it only holds safe characters
pub(crate) fn quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '@'));

    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Whether `name` is an acceptable login name for `useradd`
pub(crate) fn is_valid_username(name: &str) -> bool {
    let name = name.strip_suffix('$').unwrap_or(name);
    let mut chars = name.chars();

    let Some(first) = chars.next() else {
        return false;
    };

    name.len() <= 32
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
