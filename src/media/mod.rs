// External tool invocation
//
// - Commands: argument builders for ffmpeg, vgmstream and 7-Zip
// - CommandRunner: the seam every subprocess goes through, so the pipeline
//   and the provisioner can be driven by a fake in tests

pub mod commands;

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub use commands::*;

use crate::error::{ExportError, Result};

/// Runs external commands to completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and wait for it to exit, returning its exit code.
    ///
    /// A process terminated by a signal reports `-1`.
    async fn run(&self, command: &MediaCommand) -> Result<i32>;
}

/// Log the command line, then run it through `runner`
pub async fn execute(runner: &dyn CommandRunner, command: &MediaCommand) -> Result<i32> {
    info!("[EXEC] {}", command);
    runner.run(command).await
}

/// Spawns real child processes via tokio
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &MediaCommand) -> Result<i32> {
        let status = Command::new(&command.binary_path)
            .args(&command.args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| ExportError::io("spawn", &command.binary_path, e))?;

        let code = status.code().unwrap_or(-1);
        debug!("{} exited with code {}", command.description, code);
        Ok(code)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_runner_reports_exit_code() {
        let ok = MediaCommand::new("/bin/sh", "true").arg("-c").arg("exit 0");
        let failing = MediaCommand::new("/bin/sh", "exit 3").arg("-c").arg("exit 3");

        assert_eq!(ProcessRunner.run(&ok).await.unwrap(), 0);
        assert_eq!(ProcessRunner.run(&failing).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_process_runner_spawn_failure_is_io_error() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg", "missing");
        let err = ProcessRunner.run(&cmd).await.unwrap_err();

        assert!(matches!(err, ExportError::Io { operation: "spawn", .. }));
    }
}
