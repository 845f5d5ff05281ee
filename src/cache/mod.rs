//! Cache liveness probing.
//!
//! A probe is a single `PING` round trip. Failures are reported through
//! [`ProbeError`], whose variants come from [`classify_redis_error`] so the
//! mapping from client errors to categories lives in one place.

use std::sync::Arc;

use async_trait::async_trait;
use redis::{ErrorKind, RedisError};

pub mod redis_client;

pub use redis_client::{RedisConnector, RedisProber};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("authentication error: {0}")]
    Auth(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unknown(String),
}

/// Failures that happen before a probe can even be attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheSetupError {
    #[error("package not available")]
    PackageUnavailable,
    /// The detail is only logged; the message stays fixed.
    #[error("config not available")]
    Config(String),
}

#[async_trait]
pub trait CacheProber: Send + Sync {
    async fn ping(&self) -> Result<(), ProbeError>;
}

/// Builds probers from the resolved cache configuration.
pub trait CacheConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn CacheProber>, CacheSetupError>;
}

/// Connector used when no cache client is compiled in or wanted.
#[derive(Debug, Clone, Default)]
pub struct UnavailableCache;

impl CacheConnector for UnavailableCache {
    fn connect(&self) -> Result<Arc<dyn CacheProber>, CacheSetupError> {
        Err(CacheSetupError::PackageUnavailable)
    }
}

pub fn classify_redis_error(err: &RedisError) -> ProbeError {
    let detail = err.to_string();

    if err.kind() == ErrorKind::AuthenticationFailed
        || matches!(err.code(), Some("NOAUTH") | Some("WRONGPASS"))
    {
        return ProbeError::Auth(detail);
    }
    if err.is_timeout() {
        return ProbeError::Timeout(detail);
    }
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        return ProbeError::Connection(detail);
    }

    match err.kind() {
        ErrorKind::InvalidClientConfig => ProbeError::Validation(detail),
        ErrorKind::ResponseError
        | ErrorKind::TypeError
        | ErrorKind::ExecAbortError
        | ErrorKind::NoScriptError
        | ErrorKind::ExtensionError => ProbeError::Protocol(detail),
        _ => ProbeError::Unknown(detail),
    }
}
