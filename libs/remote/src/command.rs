//! Command execution through a local shell.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::api::CommandRunner;
use crate::error::{RemoteError, Result};
use crate::records::CommandResult;

/// Runs commands with `sh -c` on the local host.
///
/// Suites that reach the target over SSH wrap the command themselves (for
/// example `ssh root@host '...'`); transport is not handled here.
#[derive(Debug, Clone)]
pub struct LocalCommandRunner {
    shell: String,
}

impl LocalCommandRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different POSIX shell.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for LocalCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for LocalCommandRunner {
    async fn execute(&self, command: &str) -> Result<CommandResult> {
        debug!(shell = %self.shell, command = %command, "Executing command");

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .output()
            .await?;

        // A signal-terminated process has no exit code.
        let status = output.status.code().ok_or_else(|| {
            RemoteError::Command(format!("terminated by signal: {command}"))
        })?;

        let result = CommandResult {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(status, stdout_len = result.stdout.len(), "Command finished");
        Ok(result)
    }
}
