//! Scripted executor for package manager tests

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kaajal_exec::{CommandResult, ExecError, ExecOptions, RemoteExecutor};

/// Answers commands containing a pattern with a canned result and
/// records every command it receives
#[derive(Default)]
pub(crate) struct MockExecutor {
    rules: Vec<(String, CommandResult)>,
    pub(crate) calls: Mutex<Vec<(String, Option<String>)>>,
}

impl MockExecutor {
    pub(crate) fn respond(mut self, pattern: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.rules.push((
            pattern.to_string(),
            CommandResult {
                status,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                duration: Duration::from_millis(1),
            },
        ));
        self
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    pub(crate) fn stdin_of(&self, pattern: &str) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(cmd, _)| cmd.contains(pattern))
            .and_then(|(_, stdin)| stdin.clone())
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn exec(&self, cmd: &str, options: &ExecOptions) -> Result<CommandResult, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((cmd.to_string(), options.stdin.clone()));

        Ok(self
            .rules
            .iter()
            .find(|(pattern, _)| cmd.contains(pattern.as_str()))
            .map_or_else(
                || CommandResult {
                    status: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(1),
                },
                |(_, result)| result.clone(),
            ))
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn home_dir(&self) -> Option<String> {
        Some("/root".to_string())
    }

    fn executor_type(&self) -> &'static str {
        "mock"
    }
}
