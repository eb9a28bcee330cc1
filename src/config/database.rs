//! Connection pool settings for the catalog store.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the `PostgreSQL` connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable overriding the pool size.
pub const ENV_DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";

/// Settings for the bounded `PostgreSQL` pool.
///
/// Callers beyond `max_connections` queue for up to `acquire_timeout`;
/// connections idle longer than `idle_timeout` are closed.
///
/// The connection string may embed a password, so `Debug` masks it.
#[derive(Clone)]
pub struct DatabaseConfig {
    url: String,
    max_connections: u32,
    acquire_timeout: Duration,
    idle_timeout: Duration,
}

impl DatabaseConfig {
    /// Default maximum pool size.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    /// Default time a caller waits for a free connection.
    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default idle time after which a pooled connection is closed.
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a configuration with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `url` is blank.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ConfigError::MissingRequiredField {
                field: ENV_DATABASE_URL,
            });
        }
        Ok(Self {
            url,
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Self::DEFAULT_ACQUIRE_TIMEOUT,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
        })
    }

    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or the pool size is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`DatabaseConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_DATABASE_URL).ok_or(ConfigError::MissingRequiredField {
            field: ENV_DATABASE_URL,
        })?;
        let mut config = Self::new(url)?;

        if let Some(raw) = lookup(ENV_DATABASE_MAX_CONNECTIONS) {
            let max = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidSetting {
                    field: ENV_DATABASE_MAX_CONNECTIONS,
                    value: raw.clone(),
                })?;
            config = config.with_max_connections(max);
        }
        Ok(config)
    }

    /// Overrides the maximum pool size.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Overrides the acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Overrides the idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Returns the connection string.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the maximum pool size.
    #[must_use]
    pub const fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Returns the acquire timeout.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Returns the idle timeout.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
