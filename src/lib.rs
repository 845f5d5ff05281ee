//! Health monitoring and auto-recovery for the Redis container that backs
//! the Control Center test environment.

pub mod cache;
pub mod config;
pub mod control;
pub mod monitor;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use config::WatchdogConfig;
pub use control::{ContainerControl, ControlError};
pub use monitor::{
    ContainerHealthMonitor, ContainerState, HealthReport, MonitorError, MonitorRegistry,
};
