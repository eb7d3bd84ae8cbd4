//! Companion application started next to the proxy.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("companion command is empty")]
    EmptyCommand,

    #[error("failed to start companion {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stop companion {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Running companion process. Killed when dropped.
#[derive(Debug)]
pub struct Companion {
    pub pid: u32,
    command: String,
    child: Child,
}

impl Companion {
    /// Start `command` (program followed by whitespace separated arguments)
    /// with stdout and stderr attached to the proxy's own.
    pub fn start(command: &str) -> Result<Self, SupervisorError> {
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(SupervisorError::EmptyCommand)?;

        let spawn_error = |source| SupervisorError::Spawn {
            command: command.to_string(),
            source,
        };

        let child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let pid = child.id().ok_or_else(|| {
            spawn_error(std::io::Error::other("process exited before it was tracked"))
        })?;

        info!("Started companion {} with pid {}", command, pid);
        Ok(Self {
            pid,
            command: command.to_string(),
            child,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Exit status if the companion has exited.
    pub fn try_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Wait for the companion to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill the companion and reap it.
    pub async fn stop(mut self) -> Result<(), SupervisorError> {
        if self.try_status().is_some() {
            return Ok(());
        }

        match self.child.kill().await {
            Err(source) if self.try_status().is_none() => {
                return Err(SupervisorError::Kill {
                    pid: self.pid,
                    source,
                });
            }
            _ => {}
        }

        if tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .is_err()
        {
            warn!("Timeout waiting for companion {} to exit", self.pid);
        }
        info!("Stopped companion {}", self.pid);
        Ok(())
    }
}
