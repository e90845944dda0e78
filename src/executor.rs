/*!
 * External command execution.
 *
 * Media transforms are delegated to external tools. This module runs such a
 * tool to completion and hands back its captured output. Execution goes
 * through the `CommandRunner` trait so the pipeline can be driven by a
 * scripted runner in tests.
 */

use async_trait::async_trait;
use log::{debug, trace, warn};
use std::fmt;
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::ExecutionError;
use crate::media_commands;

// @struct: Program plus argument vector for one external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    // @field: Executable name or path
    pub program: String,

    // @field: Arguments, passed verbatim (no shell involved)
    pub args: Vec<String>,

    // @field: Artifact the command is expected to write
    pub output_path: Option<PathBuf>,
}

impl CommandSpec {
    /// Create a command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output_path: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Record the artifact path and append it as the final argument
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.args.push(path.to_string_lossy().to_string());
        self.output_path = Some(path);
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything the process wrote to stdout
    pub stdout: String,
    /// Everything the process wrote to stderr (warnings included)
    pub stderr: String,
}

/// Runs an external command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync + Debug {
    /// Execute the command and wait for it to exit
    ///
    /// # Returns
    /// * `Ok(CommandOutput)` when the process exits with status zero, even if
    ///   it wrote warnings to stderr
    /// * `Err(ExecutionError)` when it cannot start, exits non-zero, is
    ///   killed, or outlives its deadline
    async fn execute(&self, command: &CommandSpec) -> Result<CommandOutput, ExecutionError>;
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Deadline for a single process; `None` waits indefinitely
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    /// Create an executor with the given per-process deadline
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Configured deadline
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl CommandRunner for ProcessExecutor {
    async fn execute(&self, command: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        debug!("Running: {}", command);

        // Dropping this future kills the child
        let output_future = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let result = match self.timeout {
            Some(timeout) => tokio::select! {
                result = output_future => result,
                _ = tokio::time::sleep(timeout) => {
                    return Err(ExecutionError::Timeout {
                        program: command.program.clone(),
                        timeout,
                    });
                }
            },
            None => output_future.await,
        };

        let output = result.map_err(|e| ExecutionError::Spawn {
            program: command.program.clone(),
            source: e,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let filtered = media_commands::filter_ffmpeg_stderr(&stderr);
            return Err(match output.status.code() {
                Some(code) => ExecutionError::NonZeroExit {
                    program: command.program.clone(),
                    code,
                    stderr: filtered,
                },
                None => ExecutionError::Terminated {
                    program: command.program.clone(),
                    stderr: filtered,
                },
            });
        }

        if !stdout.trim().is_empty() {
            trace!("{} stdout: {}", command.program, stdout.trim());
        }
        if let Some(path) = &command.output_path {
            if !path.exists() {
                warn!("{} succeeded but did not write {:?}", command.program, path);
            }
        }

        Ok(CommandOutput { stdout, stderr })
    }
}
