//! Granting SSH access by piping a public key into the ACL tool.

use std::io::Write;
use std::process::{Child, ChildStdin, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, info};

use crate::cmd::ExternalCommand;

#[derive(Debug, Error)]
pub enum AclError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` has no stdin pipe")]
    NoStdin { command: String },

    #[error("failed to write key to `{command}`: {source}")]
    Write {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to close stdin of `{command}`: {source}")]
    Close {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
}

/// Owns a spawned child until it has been reaped.
///
/// Dropping an unreaped guard kills and waits for the child, so early
/// returns never leave a zombie behind.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Run `command` with `key` on its stdin and require a zero exit.
pub fn grant_access(command: &ExternalCommand, key: &str) -> Result<(), AclError> {
    let cmdline = command.to_string();

    let child = command
        .to_command(&[])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| AclError::Spawn {
            command: cmdline.clone(),
            source,
        })?;
    let mut guard = ChildGuard {
        child,
        reaped: false,
    };

    let mut stdin = guard.take_stdin().ok_or_else(|| AclError::NoStdin {
        command: cmdline.clone(),
    })?;
    stdin
        .write_all(key.as_bytes())
        .map_err(|source| AclError::Write {
            command: cmdline.clone(),
            source,
        })?;
    close_stdin(stdin).map_err(|source| AclError::Close {
        command: cmdline.clone(),
        source,
    })?;
    debug!(command = %cmdline, bytes = key.len(), "key written to ACL tool");

    let status = guard.wait().map_err(|source| AclError::Wait {
        command: cmdline.clone(),
        source,
    })?;
    if !status.success() {
        return Err(AclError::Failed {
            command: cmdline,
            status,
        });
    }

    info!(command = %cmdline, "SSH key granted admin access");
    Ok(())
}

/// Close the pipe explicitly so a failing close is reported instead of
/// being swallowed by `Drop`.
fn close_stdin(stdin: ChildStdin) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::IntoRawFd;

        let fd = stdin.into_raw_fd();
        // SAFETY: fd was just released by ChildStdin and is owned here.
        if unsafe { libc::close(fd) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        drop(stdin);
        Ok(())
    }
}
