//! In-memory stand-ins for the container runtime and Redis, used by the
//! unit tests of the monitor and the control helper.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheConnector, CacheProber, CacheSetupError, ProbeError};
use crate::config::WatchdogConfig;
use crate::monitor::ContainerHealthMonitor;
use crate::runtime::{ContainerRuntime, RuntimeConnector, RuntimeError};

pub(crate) fn test_config() -> WatchdogConfig {
    WatchdogConfig {
        container_name: "redis-test".to_string(),
        poll_interval_secs: 1,
        settle_delay_ms: 0,
        retry_delay_ms: 0,
        ..Default::default()
    }
}

pub(crate) enum UnpauseBehaviour {
    /// The container is running again afterwards.
    Resume,
    /// The call succeeds but the status does not change.
    NoEffect,
    Fail(RuntimeError),
}

pub(crate) struct FakeRuntime {
    available: bool,
    status: Mutex<Result<String, RuntimeError>>,
    unpause: Mutex<UnpauseBehaviour>,
    logs: Mutex<Result<Vec<String>, RuntimeError>>,
    pub panic_on_status: AtomicBool,
    pub status_calls: AtomicUsize,
    pub pause_calls: AtomicUsize,
    pub unpause_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub last_log_tail: AtomicUsize,
}

impl FakeRuntime {
    fn build(available: bool, status: Result<String, RuntimeError>) -> Arc<Self> {
        Arc::new(Self {
            available,
            status: Mutex::new(status),
            unpause: Mutex::new(UnpauseBehaviour::Resume),
            logs: Mutex::new(Ok(Vec::new())),
            panic_on_status: AtomicBool::new(false),
            status_calls: AtomicUsize::new(0),
            pause_calls: AtomicUsize::new(0),
            unpause_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            last_log_tail: AtomicUsize::new(0),
        })
    }

    pub fn with_status(status: &str) -> Arc<Self> {
        Self::build(true, Ok(status.to_string()))
    }

    pub fn missing() -> Arc<Self> {
        Self::build(true, Err(RuntimeError::NotFound("redis-test".to_string())))
    }

    pub fn unavailable() -> Arc<Self> {
        Self::build(
            false,
            Err(RuntimeError::Unavailable("no runtime".to_string())),
        )
    }

    pub fn set_status(&self, status: Result<String, RuntimeError>) {
        *self.status.lock().expect("poisoned") = status;
    }

    pub fn current_status(&self) -> Result<String, RuntimeError> {
        self.status.lock().expect("poisoned").clone()
    }

    pub fn set_unpause(&self, behaviour: UnpauseBehaviour) {
        *self.unpause.lock().expect("poisoned") = behaviour;
    }

    pub fn set_logs(&self, logs: Result<Vec<String>, RuntimeError>) {
        *self.logs.lock().expect("poisoned") = logs;
    }

    /// Fail like the daemon does for a missing container.
    fn existing(&self) -> Result<(), RuntimeError> {
        self.current_status().map(|_| ())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn status(&self, _name: &str) -> Result<String, RuntimeError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_status.load(Ordering::SeqCst) {
            panic!("status lookup exploded");
        }
        self.current_status()
    }

    async fn pause(&self, _name: &str) -> Result<(), RuntimeError> {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.existing()?;
        self.set_status(Ok("paused".to_string()));
        Ok(())
    }

    async fn unpause(&self, _name: &str) -> Result<(), RuntimeError> {
        self.unpause_calls.fetch_add(1, Ordering::SeqCst);
        let resume = match &*self.unpause.lock().expect("poisoned") {
            UnpauseBehaviour::Resume => true,
            UnpauseBehaviour::NoEffect => false,
            UnpauseBehaviour::Fail(e) => return Err(e.clone()),
        };
        self.existing()?;
        if resume {
            self.set_status(Ok("running".to_string()));
        }
        Ok(())
    }

    async fn start(&self, _name: &str) -> Result<(), RuntimeError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.existing()?;
        self.set_status(Ok("running".to_string()));
        Ok(())
    }

    async fn stop(&self, _name: &str, _timeout: Duration) -> Result<(), RuntimeError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.existing()?;
        self.set_status(Ok("exited".to_string()));
        Ok(())
    }

    async fn logs(
        &self,
        _name: &str,
        tail: usize,
        _timestamps: bool,
    ) -> Result<Vec<String>, RuntimeError> {
        self.last_log_tail.store(tail, Ordering::SeqCst);
        self.logs.lock().expect("poisoned").clone()
    }
}

pub(crate) struct FakeRuntimeConnector {
    runtime: Arc<FakeRuntime>,
    pub fail: AtomicBool,
    pub connect_calls: AtomicUsize,
}

impl FakeRuntimeConnector {
    pub fn new(runtime: Arc<FakeRuntime>) -> Self {
        Self {
            runtime,
            fail: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
        }
    }
}

impl RuntimeConnector for FakeRuntimeConnector {
    fn connect(&self) -> Result<Arc<dyn ContainerRuntime>, RuntimeError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unavailable(
                "daemon socket missing".to_string(),
            ));
        }
        let runtime: Arc<dyn ContainerRuntime> = self.runtime.clone();
        Ok(runtime)
    }
}

/// Answers pings from a queue of scripted results, then succeeds.
#[derive(Default)]
pub(crate) struct FakeProber {
    results: Mutex<VecDeque<Result<(), ProbeError>>>,
    pub ping_calls: AtomicUsize,
}

impl FakeProber {
    pub fn push_result(&self, result: Result<(), ProbeError>) {
        self.results.lock().expect("poisoned").push_back(result);
    }
}

#[async_trait]
impl CacheProber for FakeProber {
    async fn ping(&self) -> Result<(), ProbeError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .expect("poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

pub(crate) struct FakeCacheConnector {
    prober: Arc<FakeProber>,
    setup_error: Mutex<Option<CacheSetupError>>,
    pub connect_calls: AtomicUsize,
}

impl FakeCacheConnector {
    pub fn new(prober: Arc<FakeProber>) -> Self {
        Self {
            prober,
            setup_error: Mutex::new(None),
            connect_calls: AtomicUsize::new(0),
        }
    }

    pub fn healthy() -> Self {
        Self::new(Arc::new(FakeProber::default()))
    }

    pub fn set_setup_error(&self, error: Option<CacheSetupError>) {
        *self.setup_error.lock().expect("poisoned") = error;
    }
}

impl CacheConnector for FakeCacheConnector {
    fn connect(&self) -> Result<Arc<dyn CacheProber>, CacheSetupError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.setup_error.lock().expect("poisoned").clone() {
            return Err(e);
        }
        let prober: Arc<dyn CacheProber> = self.prober.clone();
        Ok(prober)
    }
}

/// A monitor wired to fakes, with handles on every fake for assertions.
pub(crate) struct Harness {
    pub runtime: Arc<FakeRuntime>,
    pub runtime_connector: Arc<FakeRuntimeConnector>,
    pub prober: Arc<FakeProber>,
    pub cache_connector: Arc<FakeCacheConnector>,
    pub monitor: Arc<ContainerHealthMonitor>,
}

impl Harness {
    pub fn new(runtime: Arc<FakeRuntime>) -> Self {
        Self::with_config(runtime, test_config())
    }

    pub fn with_config(runtime: Arc<FakeRuntime>, config: WatchdogConfig) -> Self {
        let runtime_connector = Arc::new(FakeRuntimeConnector::new(Arc::clone(&runtime)));
        let prober = Arc::new(FakeProber::default());
        let cache_connector = Arc::new(FakeCacheConnector::new(Arc::clone(&prober)));
        let monitor = Arc::new(
            ContainerHealthMonitor::new(
                config,
                runtime_connector.clone(),
                cache_connector.clone(),
            )
            .expect("test config is valid"),
        );
        Self {
            runtime,
            runtime_connector,
            prober,
            cache_connector,
            monitor,
        }
    }
}
