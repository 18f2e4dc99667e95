//! Installer lifecycle: boot registration, setup submission and self-removal.
//!
//! The current state is never kept in memory. It is read back from the
//! filesystem each time, since the process may have been restarted by a
//! reboot at any point.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::cmd::{CommandError, ExternalCommand};
use crate::config::{Paths, Settings};
use crate::setup::service::{self, BootRegistrationError};
use crate::setup::{self, ConfigWriteError, SetupRequest};

/// How the process was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Serve the wizard; a successful setup leaves everything installed.
    Serve,
    /// Install the boot artifacts and exit without serving.
    OnBoot,
    /// Serve the wizard and remove the boot artifacts after a successful setup.
    SelfDestruct,
}

impl Mode {
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("onboot") => Mode::OnBoot,
            Some("selfdestruct") => Mode::SelfDestruct,
            _ => Mode::Serve,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No boot artifacts and no recorded setup.
    Idle,
    /// Boot job or proxy site installed; the wizard is reachable.
    Registered,
    /// A submission is being committed.
    Configuring,
    /// Setup recorded and boot artifacts gone.
    Destroyed,
}

impl LifecycleState {
    /// Infer the state from which files exist.
    pub fn detect(paths: &Paths) -> Self {
        if paths.service_file.exists() || paths.nginx_conf.exists() {
            LifecycleState::Registered
        } else if paths.hostname_file().exists() {
            LifecycleState::Destroyed
        } else {
            LifecycleState::Idle
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Registered => "registered",
            LifecycleState::Configuring => "configuring",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("failed to remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// One independent self-removal action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownStep {
    RemoveFile(PathBuf),
    Run(ExternalCommand),
}

impl TeardownStep {
    fn run(&self) -> Result<(), TeardownError> {
        match self {
            TeardownStep::RemoveFile(path) => {
                std::fs::remove_file(path).map_err(|source| TeardownError::Remove {
                    path: path.clone(),
                    source,
                })
            }
            TeardownStep::Run(command) => Ok(command.run(&[])?),
        }
    }
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownStep::RemoveFile(path) => write!(f, "remove {}", path.display()),
            TeardownStep::Run(command) => write!(f, "run `{}`", command),
        }
    }
}

/// Run every step; failures are logged and collected, never fatal.
pub fn run_teardown(steps: &[TeardownStep]) -> Vec<TeardownError> {
    let mut failures = Vec::new();
    for step in steps {
        match step.run() {
            Ok(()) => info!(step = %step, "teardown step done"),
            Err(e) => {
                warn!(step = %step, error = %e, "teardown step failed, continuing");
                failures.push(e);
            }
        }
    }
    failures
}

/// Drives the state transitions for one invocation mode.
#[derive(Debug, Clone)]
pub struct Controller {
    settings: Arc<Settings>,
    mode: Mode,
}

impl Controller {
    pub fn new(settings: Arc<Settings>, mode: Mode) -> Self {
        Self { settings, mode }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::detect(&self.settings.paths)
    }

    /// `Idle -> Registered`.
    pub fn register(&self) -> Result<LifecycleState, BootRegistrationError> {
        service::register_for_boot(&self.settings)?;
        Ok(LifecycleState::Registered)
    }

    /// Commit a submission, then self-destruct if launched in that mode.
    ///
    /// Returns the state the installer is left in. A failed commit leaves it
    /// `Configuring`; the operator resubmits the whole form.
    pub fn submit(&self, request: &SetupRequest) -> Result<LifecycleState, ConfigWriteError> {
        info!(
            from = %self.state(),
            hostname = %request.hostname(),
            vhost = request.use_vhost(),
            "committing setup"
        );
        setup::commit_setup(&self.settings, request)?;

        if self.mode != Mode::SelfDestruct {
            return Ok(LifecycleState::Configuring);
        }

        let failures = self.self_destruct();
        if !failures.is_empty() {
            warn!(failed_steps = failures.len(), "self-destruct finished with errors");
        }
        Ok(LifecycleState::Destroyed)
    }

    /// `Configuring -> Destroyed`. The serving process keeps running.
    pub fn self_destruct(&self) -> Vec<TeardownError> {
        info!("setup complete, removing installer boot artifacts");
        run_teardown(&service::teardown_steps(&self.settings))
    }
}
