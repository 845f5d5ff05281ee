//! One monitor per process, created on first use.
//!
//! The registry is built once at start-up and handed to whoever needs the
//! monitor, instead of living in a global.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{ContainerHealthMonitor, MonitorError};
use crate::cache::{CacheConnector, RedisConnector};
use crate::config::WatchdogConfig;
use crate::runtime::{DockerConnector, RuntimeConnector};

pub struct MonitorRegistry {
    config: WatchdogConfig,
    runtime_connector: Arc<dyn RuntimeConnector>,
    cache_connector: Arc<dyn CacheConnector>,
    monitor: Mutex<Option<Arc<ContainerHealthMonitor>>>,
}

impl MonitorRegistry {
    pub fn new(
        config: WatchdogConfig,
        runtime_connector: Arc<dyn RuntimeConnector>,
        cache_connector: Arc<dyn CacheConnector>,
    ) -> Self {
        Self {
            config,
            runtime_connector,
            cache_connector,
            monitor: Mutex::new(None),
        }
    }

    /// Registry backed by the local Docker daemon and a real Redis client.
    pub fn from_config(config: WatchdogConfig) -> Self {
        let cache = RedisConnector::new(config.cache.clone());
        Self::new(config, Arc::new(DockerConnector), Arc::new(cache))
    }

    /// The process-wide monitor, constructed on the first call.
    pub async fn get_monitor(&self) -> Result<Arc<ContainerHealthMonitor>, MonitorError> {
        let mut monitor = self.monitor.lock().await;
        if let Some(monitor) = monitor.as_ref() {
            return Ok(Arc::clone(monitor));
        }

        let created = Arc::new(ContainerHealthMonitor::new(
            self.config.clone(),
            Arc::clone(&self.runtime_connector),
            Arc::clone(&self.cache_connector),
        )?);
        log::debug!(
            "Created health monitor for Redis container {}",
            created.container_name()
        );
        *monitor = Some(Arc::clone(&created));
        Ok(created)
    }

    /// Stop monitoring, release client handles and forget the monitor.
    pub async fn cleanup_monitor(&self) {
        let Some(monitor) = self.monitor.lock().await.take() else {
            return;
        };
        monitor.stop_monitoring().await;
        monitor.release_cache().await;
        log::debug!(
            "Released health monitor for Redis container {}",
            monitor.container_name()
        );
    }

    /// `ensure_available` on the process-wide monitor. Failing to build the
    /// monitor counts as unavailable.
    pub async fn ensure_available_for_tests(&self) -> bool {
        match self.get_monitor().await {
            Ok(monitor) => monitor.ensure_available().await,
            Err(e) => {
                log::error!("Unable to create Redis health monitor: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCacheConnector, FakeRuntime, FakeRuntimeConnector, test_config};

    fn registry(config: WatchdogConfig, status: &str) -> MonitorRegistry {
        let runtime = FakeRuntime::with_status(status);
        MonitorRegistry::new(
            config,
            Arc::new(FakeRuntimeConnector::new(runtime)),
            Arc::new(FakeCacheConnector::healthy()),
        )
    }

    #[tokio::test]
    async fn test_from_config_builds_lazily() {
        // No daemon or Redis needed until a check actually runs
        let registry = MonitorRegistry::from_config(test_config());
        let monitor = registry.get_monitor().await.expect("monitor");
        assert_eq!(monitor.container_name(), "redis-test");
        assert!(!monitor.is_monitoring().await);
        registry.cleanup_monitor().await;
    }

    #[tokio::test]
    async fn test_get_monitor_returns_the_same_instance() {
        let registry = registry(test_config(), "running");
        let first = registry.get_monitor().await.expect("monitor");
        let second = registry.get_monitor().await.expect("monitor");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_cleanup_resets_the_registry() {
        let registry = registry(test_config(), "running");
        let first = registry.get_monitor().await.expect("monitor");
        first.start_monitoring().await;

        registry.cleanup_monitor().await;
        assert!(!first.is_monitoring().await);

        let second = registry.get_monitor().await.expect("monitor");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_cleanup_without_monitor_is_a_noop() {
        let registry = registry(test_config(), "running");
        registry.cleanup_monitor().await;
        registry.cleanup_monitor().await;
    }

    #[tokio::test]
    async fn test_construction_error_propagates() {
        let config = WatchdogConfig {
            poll_interval_secs: 0,
            ..test_config()
        };
        let registry = registry(config, "running");
        assert!(registry.get_monitor().await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_available_for_tests() {
        assert!(
            registry(test_config(), "running")
                .ensure_available_for_tests()
                .await
        );
        assert!(
            !registry(test_config(), "exited")
                .ensure_available_for_tests()
                .await
        );

        let broken = WatchdogConfig {
            container_name: String::new(),
            ..test_config()
        };
        assert!(!registry(broken, "running").ensure_available_for_tests().await);
    }
}
