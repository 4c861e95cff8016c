//! # Platform-specific utilities
//!
//! Questo modulo centralizza l'esecuzione dei tool esterni. I comandi vengono
//! lanciati direttamente (senza shell) a partire da una [`CommandLine`] già
//! risolta.

use crate::error::{BatchError, Result};
use crate::template::CommandLine;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Turn a non-zero exit into an `ExternalTool` error
    pub fn check(self, command: &CommandLine) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let message = match self.code {
            Some(code) => format!("exit code {}: {}", code, self.stderr.trim()),
            None => format!("terminated by signal: {}", self.stderr.trim()),
        };
        Err(BatchError::ExternalTool {
            command: command.to_string(),
            message,
        })
    }
}

/// Runs external commands; swapped for a fake in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandLine) -> Result<ToolOutput>;
}

/// Spawns commands with `tokio::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &CommandLine) -> Result<ToolOutput> {
        debug!("Command: {}", command);

        let output = Command::new(&command.program)
            .args(&command.args)
            .output()
            .await
            .map_err(|e| BatchError::ExternalTool {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl SystemCommandRunner {
    /// Command used to check if a program exists
    pub fn which_command() -> &'static str {
        if cfg!(windows) {
            "where"
        } else {
            "which"
        }
    }

    /// Check if a command is available on the system
    pub async fn is_command_available(name: &str) -> bool {
        let result = Command::new(Self::which_command())
            .arg(name)
            .output()
            .await;

        match result {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}
