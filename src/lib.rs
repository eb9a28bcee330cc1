//! # Partner Catalog Sync
//!
//! A client for a marketplace partner API that signs every call, rides out
//! token expiry and rate limiting, lists large catalogs concurrently and
//! persists them into `PostgreSQL` with idempotent bulk upserts.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`PartnerConfig`] and [`PartnerConfigBuilder`]
//! - HMAC-SHA256 request signing via [`auth::signer`]
//! - Single-flight bearer token refresh via [`TokenRefresher`]
//! - A retrying request engine via [`RequestEngine`], returning a tagged
//!   [`CallOutcome`]
//! - Concurrent, deduplicated catalog listing via [`sync::Paginator`]
//! - Transactional bulk upserts via [`db::UpsertBatcher`]
//!
//! ## Quick Start
//!
//! ```rust
//! use partner_sync::{ApiHost, PartnerConfig, PartnerId, PartnerSecret, ShopId};
//!
//! let config = PartnerConfig::builder()
//!     .partner_id(PartnerId::new("2001887").unwrap())
//!     .partner_secret(PartnerSecret::new("partner-secret").unwrap())
//!     .host(ApiHost::new("https://partner.example.com").unwrap())
//!     .shop_id(ShopId::new("123456").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.shop_id().value(), 123_456);
//! ```
//!
//! ## Running a Sync
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use partner_sync::{Credentials, CredentialsHandle, DatabaseConfig, PartnerConfig, RequestEngine, TokenRefresher};
//! use partner_sync::db::{self, PgCatalogStore, PgTokenStore, UpsertBatcher};
//! use partner_sync::sync::{CatalogApi, CatalogSync, ItemStatus};
//!
//! let config = PartnerConfig::from_env()?;
//! let pool = db::create_pool(&DatabaseConfig::from_env()?).await?;
//! db::run_migrations(&pool).await?;
//! tokio::spawn(db::close_pool_on_shutdown(pool.clone()));
//!
//! let credentials = Arc::new(CredentialsHandle::new(Credentials::from_config(&config)));
//! let refresher = Arc::new(TokenRefresher::new(
//!     Arc::new(PgTokenStore::new(pool.clone())),
//!     credentials,
//! ));
//! let engine = Arc::new(RequestEngine::new(&config, refresher)?);
//!
//! let sync = CatalogSync::new(
//!     CatalogApi::new(engine),
//!     UpsertBatcher::new(PgCatalogStore::new(pool)),
//! );
//! let report = sync.run(&ItemStatus::ALL).await?;
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: credentials live in an explicit [`CredentialsHandle`]
//! - **Fail-fast validation**: all newtypes validate on construction
//! - **Thread-safe**: shared types are `Send + Sync`
//! - **Async-first**: designed for use with the Tokio runtime
//! - **Bounded retries**: every engine call ends in success or one fatal error

pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod sync;

// Re-export public types at crate root for convenience
pub use auth::{AccessToken, Credentials, CredentialsHandle, TokenError, TokenRefresher, TokenSource};
pub use config::{
    ApiHost, DatabaseConfig, PartnerConfig, PartnerConfigBuilder, PartnerId, PartnerSecret, ShopId,
};
pub use error::ConfigError;

// Re-export request engine types
pub use clients::{
    AuthFlags, BusinessError, CallOutcome, Clock, Envelope, HttpMethod, PartnerRequest,
    RequestEngine, SystemClock, TransportError, TransportErrorKind,
};
pub use db::DatabaseError;
pub use sync::SyncError;
