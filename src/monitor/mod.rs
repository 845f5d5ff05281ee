//! Health monitoring and auto-recovery of the Redis container.
//!
//! A check reads the container state, unpauses a paused container when
//! auto-recovery is enabled, pings Redis when the container runs, and folds
//! everything into a [`HealthReport`]. None of the public operations return
//! errors: every failure ends up in the report, in a `false`, or in an empty
//! list, and is logged where it happens.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::cache::{CacheConnector, CacheProber, CacheSetupError};
use crate::config::{ConfigError, WatchdogConfig};
use crate::runtime::{ContainerRuntime, RuntimeConnector, RuntimeError};

pub mod background;
pub mod registry;
pub mod report;
pub mod security;
pub mod state;

use background::LoopState;
pub use registry::MonitorRegistry;
pub use report::{HealthReport, ProbeOutcome};
pub use security::scan_for_alerts;
pub use state::ContainerState;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Invalid monitor configuration: {0}")]
    Config(#[from] ConfigError),
}

pub struct ContainerHealthMonitor {
    config: WatchdogConfig,
    runtime_connector: Arc<dyn RuntimeConnector>,
    cache_connector: Arc<dyn CacheConnector>,
    runtime: Mutex<Option<Arc<dyn ContainerRuntime>>>,
    cache: Mutex<Option<Arc<dyn CacheProber>>>,
    background: Mutex<LoopState>,
}

impl ContainerHealthMonitor {
    pub fn new(
        config: WatchdogConfig,
        runtime_connector: Arc<dyn RuntimeConnector>,
        cache_connector: Arc<dyn CacheConnector>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            config,
            runtime_connector,
            cache_connector,
            runtime: Mutex::new(None),
            cache: Mutex::new(None),
            background: Mutex::new(LoopState::Stopped),
        })
    }

    pub fn container_name(&self) -> &str {
        &self.config.container_name
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    async fn runtime(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        let mut runtime = self.runtime.lock().await;
        if let Some(runtime) = runtime.as_ref() {
            return Ok(Arc::clone(runtime));
        }
        let created = self.runtime_connector.connect()?;
        *runtime = Some(Arc::clone(&created));
        Ok(created)
    }

    /// Drop the cached runtime handle; the next operation creates a new one.
    pub(crate) async fn release_runtime(&self) {
        self.runtime.lock().await.take();
    }

    pub(crate) async fn release_cache(&self) {
        self.cache.lock().await.take();
    }

    async fn cache_prober(&self) -> Result<Arc<dyn CacheProber>, CacheSetupError> {
        let mut cache = self.cache.lock().await;
        if let Some(prober) = cache.as_ref() {
            return Ok(Arc::clone(prober));
        }
        let created = self.cache_connector.connect()?;
        *cache = Some(Arc::clone(&created));
        Ok(created)
    }

    /// Current state of the container. Never fails: anything that prevents
    /// a reading yields `Unknown`, a missing container `NotFound`.
    pub async fn container_state(&self) -> ContainerState {
        let name = self.container_name();

        let runtime = match self.runtime().await {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Unable to create container runtime client: {}", e);
                return ContainerState::Unknown;
            }
        };
        if !runtime.is_available() {
            log::debug!("No container runtime available, state of {} unknown", name);
            return ContainerState::Unknown;
        }

        match runtime.status(name).await {
            Ok(status) => {
                let state = ContainerState::from_status(&status);
                if state == ContainerState::Unknown {
                    log::warn!("Unknown status {:?} for container {}", status, name);
                }
                state
            }
            Err(RuntimeError::NotFound(_)) => {
                log::warn!("Container {} not found", name);
                ContainerState::NotFound
            }
            Err(e @ RuntimeError::Unavailable(_)) => {
                log::error!("Container runtime error while inspecting {}: {:?}", name, e);
                ContainerState::Unknown
            }
            Err(e) => {
                log::error!("Unexpected error while inspecting {}: {:?}", name, e);
                ContainerState::Unknown
            }
        }
    }

    /// Unpause the container and confirm it is running again once the
    /// settle delay has passed.
    pub async fn unpause_container(&self) -> bool {
        let name = self.container_name();

        if !self.config.auto_recovery {
            log::warn!("Auto-recovery disabled, not unpausing {}", name);
            return false;
        }

        let runtime = match self.runtime().await {
            Ok(runtime) if runtime.is_available() => runtime,
            Ok(_) => {
                log::error!("No container runtime available, cannot unpause {}", name);
                return false;
            }
            Err(e) => {
                log::error!("Unable to create container runtime client: {}", e);
                return false;
            }
        };

        log::info!("Attempting to unpause container {}", name);
        if let Err(e) = runtime.unpause(name).await {
            match e {
                RuntimeError::NotFound(_) => {
                    log::error!("Container {} not found while unpausing", name)
                }
                RuntimeError::Unavailable(e) => {
                    log::error!("Container runtime error while unpausing {}: {}", name, e)
                }
                RuntimeError::Api(e) => {
                    log::error!("Unexpected error while unpausing {}: {}", name, e)
                }
            }
            return false;
        }

        tokio::time::sleep(self.config.settle_delay()).await;

        match runtime.status(name).await {
            Ok(status) if status == "running" => {
                log::info!("Container {} unpaused successfully", name);
                true
            }
            Ok(status) => {
                log::error!(
                    "Container {} reports {:?} after unpause, expected running",
                    name,
                    status
                );
                false
            }
            Err(e) => {
                log::error!("Unable to verify container {} after unpause: {}", name, e);
                false
            }
        }
    }

    /// Ping Redis once and time the round trip.
    pub async fn test_connection(&self) -> ProbeOutcome {
        let prober = match self.cache_prober().await {
            Ok(prober) => prober,
            Err(e) => {
                log::warn!("Redis client unavailable: {:?}", e);
                return ProbeOutcome::failed(e.to_string());
            }
        };

        let started = Instant::now();
        match prober.ping().await {
            Ok(()) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                log::debug!("Redis ping succeeded in {:.2} ms", latency_ms);
                ProbeOutcome::succeeded(latency_ms)
            }
            Err(e) => {
                log::warn!("Redis ping failed: {}", e);
                ProbeOutcome::failed(format!("ping failed: {e}"))
            }
        }
    }

    /// Run one full check: state, recovery when paused, liveness probe.
    pub async fn check_health(&self) -> HealthReport {
        let state = self.container_state().await;
        let mut report = HealthReport::new(state, Some(self.container_name().to_string()));

        if state == ContainerState::Paused && self.config.auto_recovery {
            report.auto_recovery_attempted = true;

            if self.unpause_container().await {
                report.auto_recovery_successful = true;
                report.container_state = self.container_state().await;
            } else {
                // Still paused: pinging would only time out
                report.requires_manual_intervention = true;
                return report;
            }
        }

        if report.container_state == ContainerState::Running {
            let probe = self.test_connection().await;
            report.connection_successful = probe.success;
            report.ping_latency_ms = probe.latency_ms;
            report.error_message = probe.error;
        } else {
            report.connection_successful = false;
            report.error_message = Some(format!(
                "Container not running: {}",
                report.container_state
            ));
        }

        // A paused container without auto-recovery is left for the caller
        // to retry and is not flagged here.
        if report.container_state.needs_manual_intervention() {
            report.requires_manual_intervention = true;
        }

        report
    }

    /// Single yes/no answer for callers such as test setup. Runs at most
    /// two checks with one fixed delay in between.
    pub async fn ensure_available(&self) -> bool {
        let name = self.container_name();
        let report = self.check_health().await;

        if report.connection_successful {
            return true;
        }

        if report.requires_manual_intervention {
            log::error!(
                "Redis container {} requires manual intervention (state: {})",
                name,
                report.container_state
            );
            return false;
        }

        if report.auto_recovery_attempted && !report.auto_recovery_successful {
            log::error!("Auto-recovery of Redis container {} failed", name);
            return false;
        }

        let delay = self.config.retry_delay();
        log::warn!(
            "Redis not available ({}), retrying in {:?}",
            report.error_message.as_deref().unwrap_or("no details"),
            delay
        );
        tokio::time::sleep(delay).await;

        let retry = self.check_health().await;
        if retry.connection_successful {
            log::info!("Redis container {} available after retry", name);
        } else {
            log::error!(
                "Redis container {} still unavailable after retry: {}",
                name,
                retry.error_message.as_deref().unwrap_or("no details")
            );
        }
        retry.connection_successful
    }

    /// Recent log lines of the container that look like an attack.
    pub async fn detect_security_alerts(&self) -> Vec<String> {
        let name = self.container_name();

        let runtime = match self.runtime().await {
            Ok(runtime) if runtime.is_available() => runtime,
            Ok(_) => {
                log::debug!("No container runtime available, skipping log scan");
                return Vec::new();
            }
            Err(e) => {
                log::warn!("Unable to create container runtime client: {}", e);
                return Vec::new();
            }
        };

        let lines = match runtime.logs(name, self.config.log_tail, false).await {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("Unable to read logs of container {}: {}", name, e);
                return Vec::new();
            }
        };

        let alerts = scan_for_alerts(&lines);
        for alert in &alerts {
            log::warn!("Security alert in {} logs: {}", name, alert);
        }
        alerts
    }
}
