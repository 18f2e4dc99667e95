//! External tools the installer shells out to (`dig`, `sshcommand`,
//! Upstart's `restart`/`stop`).

use std::fmt;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
}

/// A program plus its fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Build a `std::process::Command` with `extra` appended after the fixed args.
    pub fn to_command(&self, extra: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(extra);
        command
    }

    /// Run to completion with output discarded; non-zero exit is an error.
    pub fn run(&self, extra: &[&str]) -> Result<(), CommandError> {
        let cmdline = self.display_with(extra);
        debug!(command = %cmdline, "running external command");

        let status = self
            .to_command(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| CommandError::Spawn {
                command: cmdline.clone(),
                source,
            })?;

        if !status.success() {
            return Err(CommandError::Failed {
                command: cmdline,
                status,
            });
        }
        Ok(())
    }

    pub fn display_with(&self, extra: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .chain(extra.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_with(&[]))
    }
}
