//! `/etc/os-release` parsing

/// Identification fields from `/etc/os-release`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    /// `ID`
    pub id: String,
    /// `NAME`
    pub name: String,
    /// `PRETTY_NAME`
    pub pretty_name: String,
}

impl OsRelease {
    /// Parse `KEY=VALUE` lines, stripping surrounding quotes
    ///
    /// Unknown keys, comments and malformed lines are ignored.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut release = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let value = unquote(value.trim()).to_string();
            match key.trim() {
                "ID" => release.id = value,
                "NAME" => release.name = value,
                "PRETTY_NAME" => release.pretty_name = value,
                _ => {}
            }
        }

        release
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
