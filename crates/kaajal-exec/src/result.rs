//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stderr with surrounding whitespace removed
    #[must_use]
    pub fn error_text(&self) -> &str {
        self.stderr.trim()
    }
}

/// Per-command options
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Text written to the command's stdin, followed by EOF
    pub stdin: Option<String>,
}

impl ExecOptions {
    /// Feed `input` to the command's stdin
    #[must_use]
    pub fn with_stdin(input: impl Into<String>) -> Self {
        Self {
            stdin: Some(input.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_trims() {
        let result = CommandResult {
            status: 1,
            stdout: String::new(),
            stderr: "  boom\n".to_string(),
            duration: Duration::ZERO,
        };

        assert!(!result.success());
        assert_eq!(result.error_text(), "boom");
    }
}
