//! Configuration types for the partner sync crate.
//!
//! This module provides the configuration used to talk to the partner API
//! and to the relational store.
//!
//! # Overview
//!
//! - [`PartnerConfig`]: partner credentials, API host, shop and HTTP settings
//! - [`PartnerConfigBuilder`]: a builder for constructing [`PartnerConfig`] instances
//! - [`DatabaseConfig`]: connection pool settings for the catalog store
//! - [`PartnerId`], [`PartnerSecret`], [`ShopId`], [`ApiHost`]: validated newtypes
//!
//! # Example
//!
//! ```rust
//! use partner_sync::{PartnerConfig, PartnerId, PartnerSecret, ApiHost, ShopId};
//!
//! let config = PartnerConfig::builder()
//!     .partner_id(PartnerId::new("2001887").unwrap())
//!     .partner_secret(PartnerSecret::new("my-secret").unwrap())
//!     .host(ApiHost::new("https://partner.example.com").unwrap())
//!     .shop_id(ShopId::new("123456").unwrap())
//!     .build()
//!     .unwrap();
//! ```

mod database;
mod newtypes;

pub use database::DatabaseConfig;
pub use newtypes::{ApiHost, PartnerId, PartnerSecret, ShopId};

use std::time::Duration;

use crate::error::ConfigError;

/// Default timeout applied to every outbound partner API call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the partner identifier.
pub const ENV_PARTNER_ID: &str = "PARTNER_ID";
/// Environment variable holding the partner secret.
pub const ENV_PARTNER_KEY: &str = "PARTNER_KEY";
/// Environment variable holding the partner API host.
pub const ENV_PARTNER_HOST: &str = "PARTNER_HOST";
/// Environment variable holding the shop identifier.
pub const ENV_SHOP_ID: &str = "SHOP_ID";

/// Configuration for talking to the partner API.
///
/// # Thread Safety
///
/// `PartnerConfig` is `Clone`, `Send`, and `Sync`.
#[derive(Clone, Debug)]
pub struct PartnerConfig {
    partner_id: PartnerId,
    partner_secret: PartnerSecret,
    host: ApiHost,
    shop_id: ShopId,
    request_timeout: Duration,
    user_agent_prefix: Option<String>,
}

impl PartnerConfig {
    /// Creates a new builder for constructing a `PartnerConfig`.
    #[must_use]
    pub fn builder() -> PartnerConfigBuilder {
        PartnerConfigBuilder::new()
    }

    /// Loads the configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Reads [`ENV_PARTNER_ID`], [`ENV_PARTNER_KEY`], [`ENV_PARTNER_HOST`]
    /// and [`ENV_SHOP_ID`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] naming the first absent
    /// or empty variable, or a validation error if a value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; the variables may come from the process.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`PartnerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |field: &'static str| {
            lookup(field)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingRequiredField { field })
        };

        Self::builder()
            .partner_id(PartnerId::new(required(ENV_PARTNER_ID)?)?)
            .partner_secret(PartnerSecret::new(required(ENV_PARTNER_KEY)?)?)
            .host(ApiHost::new(required(ENV_PARTNER_HOST)?)?)
            .shop_id(ShopId::new(required(ENV_SHOP_ID)?)?)
            .build()
    }

    /// Returns the partner ID.
    #[must_use]
    pub const fn partner_id(&self) -> PartnerId {
        self.partner_id
    }

    /// Returns the partner secret.
    #[must_use]
    pub const fn partner_secret(&self) -> &PartnerSecret {
        &self.partner_secret
    }

    /// Returns the API host.
    #[must_use]
    pub const fn host(&self) -> &ApiHost {
        &self.host
    }

    /// Returns the shop ID.
    #[must_use]
    pub const fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }
}

// Verify PartnerConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PartnerConfig>();
};

/// Builder for constructing [`PartnerConfig`] instances.
///
/// Required fields are `partner_id`, `partner_secret`, `host` and `shop_id`.
///
/// # Defaults
///
/// - `request_timeout`: [`DEFAULT_REQUEST_TIMEOUT`]
/// - `user_agent_prefix`: `None`
#[derive(Debug, Default)]
pub struct PartnerConfigBuilder {
    partner_id: Option<PartnerId>,
    partner_secret: Option<PartnerSecret>,
    host: Option<ApiHost>,
    shop_id: Option<ShopId>,
    request_timeout: Option<Duration>,
    user_agent_prefix: Option<String>,
}

impl PartnerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the partner ID (required).
    #[must_use]
    pub const fn partner_id(mut self, id: PartnerId) -> Self {
        self.partner_id = Some(id);
        self
    }

    /// Sets the partner secret (required).
    #[must_use]
    pub fn partner_secret(mut self, secret: PartnerSecret) -> Self {
        self.partner_secret = Some(secret);
        self
    }

    /// Sets the API host (required).
    #[must_use]
    pub fn host(mut self, host: ApiHost) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the shop ID (required).
    #[must_use]
    pub const fn shop_id(mut self, shop_id: ShopId) -> Self {
        self.shop_id = Some(shop_id);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Builds the [`PartnerConfig`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if any required field is not set.
    pub fn build(self) -> Result<PartnerConfig, ConfigError> {
        let partner_id = self
            .partner_id
            .ok_or(ConfigError::MissingRequiredField {
                field: "partner_id",
            })?;
        let partner_secret = self
            .partner_secret
            .ok_or(ConfigError::MissingRequiredField {
                field: "partner_secret",
            })?;
        let host = self
            .host
            .ok_or(ConfigError::MissingRequiredField { field: "host" })?;
        let shop_id = self
            .shop_id
            .ok_or(ConfigError::MissingRequiredField { field: "shop_id" })?;

        Ok(PartnerConfig {
            partner_id,
            partner_secret,
            host,
            shop_id,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}
