use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::ContainerState;

/// Outcome of one aggregate health check. A fresh report is built for
/// every check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub check_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub container_state: ContainerState,
    pub container_name: Option<String>,
    pub connection_successful: bool,
    pub ping_latency_ms: Option<f64>,
    pub error_message: Option<String>,
    pub auto_recovery_attempted: bool,
    /// Only ever true when `auto_recovery_attempted` is.
    pub auto_recovery_successful: bool,
    /// Only ever true when `connection_successful` is false.
    pub requires_manual_intervention: bool,
}

impl HealthReport {
    pub fn new(container_state: ContainerState, container_name: Option<String>) -> Self {
        Self {
            check_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            container_state,
            container_name,
            connection_successful: false,
            ping_latency_ms: None,
            error_message: None,
            auto_recovery_attempted: false,
            auto_recovery_successful: false,
            requires_manual_intervention: false,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.connection_successful
    }
}

/// Result of a single liveness probe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeOutcome {
    pub success: bool,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn succeeded(latency_ms: f64) -> Self {
        Self {
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            latency_ms: None,
            error: Some(error.into()),
        }
    }
}
