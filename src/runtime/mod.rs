//! Container runtime client.
//!
//! The monitor only ever talks to the runtime through [`ContainerRuntime`],
//! so the Docker daemon can be swapped for [`UnavailableRuntime`] (when the
//! daemon cannot be reached at all) or for a fake in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod docker;

pub use docker::{DockerConnector, DockerRuntime};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("Container {0} not found")]
    NotFound(String),
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),
    #[error("Container runtime API error: {0}")]
    Api(String),
}

/// Lifecycle operations on a single named container.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether this client can talk to a runtime at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Lowercase status string as reported by the runtime
    /// (`running`, `paused`, `exited`, ...).
    async fn status(&self, name: &str) -> Result<String, RuntimeError>;

    async fn pause(&self, name: &str) -> Result<(), RuntimeError>;

    async fn unpause(&self, name: &str) -> Result<(), RuntimeError>;

    async fn start(&self, name: &str) -> Result<(), RuntimeError>;

    async fn stop(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError>;

    /// The last `tail` log lines of the container, stdout and stderr merged.
    async fn logs(
        &self,
        name: &str,
        tail: usize,
        timestamps: bool,
    ) -> Result<Vec<String>, RuntimeError>;
}

/// Creates runtime handles on demand.
pub trait RuntimeConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError>;
}

/// Stand-in used when no container runtime can be reached.
#[derive(Debug, Clone, Default)]
pub struct UnavailableRuntime;

#[async_trait]
impl ContainerRuntime for UnavailableRuntime {
    fn is_available(&self) -> bool {
        false
    }

    async fn status(&self, _name: &str) -> Result<String, RuntimeError> {
        Err(unavailable())
    }

    async fn pause(&self, _name: &str) -> Result<(), RuntimeError> {
        Err(unavailable())
    }

    async fn unpause(&self, _name: &str) -> Result<(), RuntimeError> {
        Err(unavailable())
    }

    async fn start(&self, _name: &str) -> Result<(), RuntimeError> {
        Err(unavailable())
    }

    async fn stop(&self, _name: &str, _timeout: Duration) -> Result<(), RuntimeError> {
        Err(unavailable())
    }

    async fn logs(
        &self,
        _name: &str,
        _tail: usize,
        _timestamps: bool,
    ) -> Result<Vec<String>, RuntimeError> {
        Err(unavailable())
    }
}

fn unavailable() -> RuntimeError {
    RuntimeError::Unavailable("no container runtime client".to_string())
}

#[derive(Debug, Clone, Default)]
pub struct UnavailableConnector;

impl RuntimeConnector for UnavailableConnector {
    fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        Ok(Arc::new(UnavailableRuntime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_runtime_rejects_everything() {
        let runtime = UnavailableConnector.connect().expect("connect");
        assert!(!runtime.is_available());
        assert!(matches!(
            runtime.status("redis").await,
            Err(RuntimeError::Unavailable(_))
        ));
        assert!(matches!(
            runtime.unpause("redis").await,
            Err(RuntimeError::Unavailable(_))
        ));
        assert!(matches!(
            runtime.logs("redis", 50, false).await,
            Err(RuntimeError::Unavailable(_))
        ));
    }
}
