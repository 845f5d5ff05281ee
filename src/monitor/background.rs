//! Periodic health checks running in the background.
//!
//! The loop only observes and logs; callers that need an answer use
//! [`ContainerHealthMonitor::check_health`] or
//! [`ContainerHealthMonitor::ensure_available`] directly.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ContainerHealthMonitor, ContainerState, HealthReport};

pub(crate) enum LoopState {
    Stopped,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
}

impl ContainerHealthMonitor {
    /// Spawn the monitoring loop. Does nothing if it is already running.
    pub async fn start_monitoring(self: &Arc<Self>) {
        let mut state = self.background.lock().await;
        if matches!(*state, LoopState::Running { .. }) {
            log::debug!("Monitoring of {} already running", self.container_name());
            return;
        }

        let cancel = CancellationToken::new();
        let interval = self.config.poll_interval();
        let handle = tokio::spawn(run_loop(Arc::downgrade(self), cancel.clone(), interval));
        *state = LoopState::Running { cancel, handle };

        log::info!(
            "Started monitoring Redis container {} every {:?}",
            self.container_name(),
            interval
        );
    }

    /// Stop the loop if it runs and release the runtime handle. Safe to call
    /// at any time, including when monitoring was never started.
    pub async fn stop_monitoring(&self) {
        let previous = std::mem::replace(&mut *self.background.lock().await, LoopState::Stopped);

        if let LoopState::Running { cancel, handle } = previous {
            cancel.cancel();
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => log::error!("Monitoring task ended abnormally: {}", e),
            }
            log::info!("Stopped monitoring Redis container {}", self.container_name());
        }

        self.release_runtime().await;
    }

    pub async fn is_monitoring(&self) -> bool {
        matches!(*self.background.lock().await, LoopState::Running { .. })
    }
}

async fn run_loop(
    monitor: Weak<ContainerHealthMonitor>,
    cancel: CancellationToken,
    interval: Duration,
) {
    loop {
        let Some(monitor) = monitor.upgrade() else {
            break;
        };

        // Own task so a panicking check cannot take the loop down with it
        let check = tokio::spawn(async move { monitor.check_health().await });
        let abort = check.abort_handle();

        tokio::select! {
            _ = cancel.cancelled() => {
                abort.abort();
                break;
            }
            result = check => match result {
                Ok(report) => log_report(&report),
                Err(e) => log::error!("Health check failed: {}", e),
            },
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    log::debug!("Monitoring loop exited");
}

fn log_report(report: &HealthReport) {
    let name = report.container_name.as_deref().unwrap_or("<unnamed>");
    let details = report.error_message.as_deref().unwrap_or("no details");

    match report.container_state {
        ContainerState::Paused => log::warn!(
            "Redis container {} is paused (auto-recovery attempted: {})",
            name,
            report.auto_recovery_attempted
        ),
        ContainerState::Stopped => log::error!(
            "Redis container {} is stopped, manual intervention required",
            name
        ),
        ContainerState::NotFound => log::error!(
            "Redis container {} not found, it has to be recreated",
            name
        ),
        ContainerState::Unknown => {
            log::warn!("Redis container {} is in an unknown state: {}", name, details)
        }
        ContainerState::Running if !report.connection_successful => log::warn!(
            "Redis container {} is running but not responding: {}",
            name,
            details
        ),
        ContainerState::Running => log::debug!(
            "Redis container {} healthy, ping {:.2} ms",
            name,
            report.ping_latency_ms.unwrap_or_default()
        ),
    }
}
