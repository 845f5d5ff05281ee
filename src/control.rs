//! Direct control over the Redis container.
//!
//! Tests use this to put the cache into a known state (pause it, stop it,
//! bring it back) around the monitor. Unlike the monitor, these operations
//! report failures as errors.

use std::sync::Arc;
use std::time::Duration;

use crate::monitor::ContainerState;
use crate::runtime::{ContainerRuntime, RuntimeError};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Container {0} not found, it has to be recreated")]
    NotFound(String),
    #[error("Container {name} did not reach state {expected} within {timeout:?} (last seen: {last})")]
    Timeout {
        name: String,
        expected: ContainerState,
        last: ContainerState,
        timeout: Duration,
    },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

const DEFAULT_POLL: Duration = Duration::from_millis(250);

pub struct ContainerControl {
    runtime: Arc<dyn ContainerRuntime>,
    name: String,
}

impl ContainerControl {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, name: impl Into<String>) -> Self {
        Self {
            runtime,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> Result<ContainerState, ControlError> {
        match self.runtime.status(&self.name).await {
            Ok(status) => Ok(ContainerState::from_status(&status)),
            Err(RuntimeError::NotFound(_)) => Ok(ContainerState::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn pause(&self) -> Result<(), ControlError> {
        log::info!("Pausing container {}", self.name);
        self.runtime
            .pause(&self.name)
            .await
            .inspect_err(|e| log::error!("Failed to pause container {}: {}", self.name, e))?;
        Ok(())
    }

    pub async fn unpause(&self) -> Result<(), ControlError> {
        log::info!("Unpausing container {}", self.name);
        self.runtime
            .unpause(&self.name)
            .await
            .inspect_err(|e| log::error!("Failed to unpause container {}: {}", self.name, e))?;
        Ok(())
    }

    pub async fn start(&self) -> Result<(), ControlError> {
        log::info!("Starting container {}", self.name);
        self.runtime
            .start(&self.name)
            .await
            .inspect_err(|e| log::error!("Failed to start container {}: {}", self.name, e))?;
        Ok(())
    }

    pub async fn stop(&self, timeout: Duration) -> Result<(), ControlError> {
        log::info!("Stopping container {}", self.name);
        self.runtime
            .stop(&self.name, timeout)
            .await
            .inspect_err(|e| log::error!("Failed to stop container {}: {}", self.name, e))?;
        Ok(())
    }

    /// Poll until the container reaches `expected`.
    pub async fn wait_for_state(
        &self,
        expected: ContainerState,
        timeout: Duration,
        poll: Duration,
    ) -> Result<(), ControlError> {
        // An unrepresentable deadline means waiting without one
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        loop {
            let last = self.state().await?;
            if last == expected {
                return Ok(());
            }
            if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
                return Err(ControlError::Timeout {
                    name: self.name.clone(),
                    expected,
                    last,
                    timeout,
                });
            }
            log::debug!(
                "Waiting for container {} to be {} (currently {})",
                self.name,
                expected,
                last
            );
            tokio::time::sleep(poll).await;
        }
    }

    /// Bring the container to `running` from whatever state it is in, as
    /// long as it exists.
    pub async fn ensure_running(&self, timeout: Duration) -> Result<(), ControlError> {
        match self.state().await? {
            ContainerState::Running => return Ok(()),
            ContainerState::Paused => self.unpause().await?,
            ContainerState::Stopped => self.start().await?,
            ContainerState::NotFound => return Err(ControlError::NotFound(self.name.clone())),
            ContainerState::Unknown => {
                return Err(RuntimeError::Api(format!(
                    "container {} is in a state that cannot be recovered automatically",
                    self.name
                ))
                .into());
            }
        }
        self.wait_for_state(ContainerState::Running, timeout, DEFAULT_POLL)
            .await
    }
}
