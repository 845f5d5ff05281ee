use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::RedisResult;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::{CacheConnector, CacheProber, CacheSetupError, ProbeError, classify_redis_error};
use crate::config::{CacheConfig, REDIS_URL_ENV};

/// Creates [`RedisProber`]s from the `[cache]` section of the config.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    config: CacheConfig,
}

impl RedisConnector {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    /// The configured URL wins over the environment.
    fn resolve_url<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.config
            .url
            .clone()
            .or_else(|| lookup(REDIS_URL_ENV))
            .filter(|url| !url.trim().is_empty())
    }
}

impl CacheConnector for RedisConnector {
    fn connect(&self) -> Result<Arc<dyn CacheProber>, CacheSetupError> {
        let url = self
            .resolve_url(|key| std::env::var(key).ok())
            .ok_or_else(|| {
                CacheSetupError::Config(format!(
                    "no cache url configured and {REDIS_URL_ENV} is unset"
                ))
            })?;

        let client = redis::Client::open(url.as_str())
            .map_err(|e| CacheSetupError::Config(e.to_string()))?;

        log::debug!("Created Redis client for {}", redact_url(&url));

        Ok(Arc::new(RedisProber {
            client,
            connect_timeout: self.config.connect_timeout(),
            read_timeout: self.config.read_timeout(),
            connection: Mutex::new(None),
        }))
    }
}

/// Pings Redis over a lazily opened multiplexed connection.
pub struct RedisProber {
    client: redis::Client,
    connect_timeout: Duration,
    read_timeout: Duration,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisProber {
    async fn connection(&self) -> Result<MultiplexedConnection, ProbeError> {
        if let Some(conn) = self.connection.lock().await.as_ref() {
            return Ok(conn.clone());
        }

        let conn = match timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(classify_redis_error(&e)),
            Err(_) => {
                return Err(ProbeError::Timeout(format!(
                    "no connection within {:?}",
                    self.connect_timeout
                )));
            }
        };

        *self.connection.lock().await = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        self.connection.lock().await.take();
    }
}

#[async_trait]
impl CacheProber for RedisProber {
    async fn ping(&self) -> Result<(), ProbeError> {
        let mut conn = self.connection().await?;

        let reply: Result<RedisResult<String>, _> = timeout(
            self.read_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await;

        match reply {
            Ok(Ok(pong)) if pong.eq_ignore_ascii_case("PONG") => Ok(()),
            Ok(Ok(other)) => Err(ProbeError::Protocol(format!(
                "unexpected PING reply: {other}"
            ))),
            Ok(Err(e)) => {
                self.reset().await;
                Err(classify_redis_error(&e))
            }
            Err(_) => {
                self.reset().await;
                Err(ProbeError::Timeout(format!(
                    "no reply within {:?}",
                    self.read_timeout
                )))
            }
        }
    }
}

/// Hide the password of a connection URL before it reaches the logs.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
