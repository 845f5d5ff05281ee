//! Docker runtime client using bollard.
//!
//! The connector creates the client lazily; the daemon is only contacted
//! once the first lifecycle call is made.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::query_parameters::{
    InspectContainerOptions, InspectContainerOptionsBuilder, LogsOptions, LogsOptionsBuilder,
    StartContainerOptions, StartContainerOptionsBuilder, StopContainerOptions,
    StopContainerOptionsBuilder,
};
use futures_util::TryStreamExt;

use super::{ContainerRuntime, RuntimeConnector, RuntimeError};

/// Translate a bollard error into the runtime error taxonomy.
pub(crate) fn map_bollard_error(name: &str, err: bollard::errors::Error) -> RuntimeError {
    use bollard::errors::Error;
    match err {
        Error::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(name.to_string()),
        Error::SocketNotFoundError { .. }
        | Error::IOError { .. }
        | Error::HyperResponseError { .. }
        | Error::RequestTimeoutError => RuntimeError::Unavailable(err.to_string()),
        e => RuntimeError::Api(e.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn status(&self, name: &str) -> Result<String, RuntimeError> {
        let options: InspectContainerOptions = InspectContainerOptionsBuilder::new().build();

        let info = self
            .docker
            .inspect_container(name, Some(options))
            .await
            .map_err(|e| map_bollard_error(name, e))?;

        // A container without a reported state is treated the same as an
        // unrecognised status.
        Ok(info
            .state
            .and_then(|state| state.status)
            .map(|status| status.to_string().to_lowercase())
            .unwrap_or_default())
    }

    async fn pause(&self, name: &str) -> Result<(), RuntimeError> {
        log::debug!("Pausing container {}", name);
        self.docker
            .pause_container(name)
            .await
            .map_err(|e| map_bollard_error(name, e))
    }

    async fn unpause(&self, name: &str) -> Result<(), RuntimeError> {
        log::debug!("Unpausing container {}", name);
        self.docker
            .unpause_container(name)
            .await
            .map_err(|e| map_bollard_error(name, e))
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        log::debug!("Starting container {}", name);
        let options: StartContainerOptions = StartContainerOptionsBuilder::new().build();

        match self.docker.start_container(name, Some(options)).await {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                log::info!("Container {} already started", name);
                Ok(())
            }
            Err(e) => Err(map_bollard_error(name, e)),
        }
    }

    async fn stop(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError> {
        log::debug!("Stopping container {} (timeout {:?})", name, timeout);
        let secs = i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX);
        let options: StopContainerOptions = StopContainerOptionsBuilder::new().t(secs).build();

        match self.docker.stop_container(name, Some(options)).await {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                log::info!("Container {} already stopped", name);
                Ok(())
            }
            Err(e) => Err(map_bollard_error(name, e)),
        }
    }

    async fn logs(
        &self,
        name: &str,
        tail: usize,
        timestamps: bool,
    ) -> Result<Vec<String>, RuntimeError> {
        let options: LogsOptions = LogsOptionsBuilder::new()
            .stdout(true)
            .stderr(true)
            .timestamps(timestamps)
            .tail(&tail.to_string())
            .build();

        let chunks: Vec<LogOutput> = self
            .docker
            .logs(name, Some(options))
            .try_collect()
            .await
            .map_err(|e| map_bollard_error(name, e))?;

        let mut text = String::new();
        for chunk in chunks {
            text.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }

        Ok(text.lines().map(str::to_string).collect())
    }
}

/// Connects to the local Docker daemon with the platform defaults
/// (Unix socket on Linux/macOS, named pipe on Windows).
#[derive(Debug, Clone, Default)]
pub struct DockerConnector;

impl RuntimeConnector for DockerConnector {
    fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        Ok(Arc::new(DockerRuntime::new(docker)))
    }
}
