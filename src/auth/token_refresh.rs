//! Single-flight bearer token refresh.
//!
//! When several concurrent calls hit an authentication failure at the same
//! time, they must not each go to the token store. [`TokenRefresher`] keeps
//! one slot holding the outstanding refresh as a shared future:
//!
//! 1. The first caller finds the slot empty, starts the fetch and stores it.
//! 2. Every caller arriving while the slot is occupied clones and awaits the
//!    same future, so exactly one underlying fetch runs.
//! 3. Once the fetch resolves, success or failure, the slot is cleared and
//!    the next caller that needs a token starts a new fetch.
//!
//! The fetch runs on its own task, so it completes (and publishes the new
//! credential snapshot) even if every waiter is dropped midway. That task
//! owns the slot's release, so abandoned waiters never leave a settled
//! refresh behind for later callers to reuse.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use partner_sync::auth::{CredentialsHandle, TokenRefresher};
//! use partner_sync::db::PgTokenStore;
//!
//! let refresher = TokenRefresher::new(Arc::new(PgTokenStore::new(pool)), credentials);
//! let token = refresher.refresh_once().await?;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::auth::credentials::{AccessToken, CredentialsHandle};
use crate::auth::error::TokenError;
use crate::config::ShopId;

/// A source of fresh bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetches the current bearer token for `shop_id`.
    async fn fetch_token(&self, shop_id: ShopId) -> Result<AccessToken, TokenError>;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<AccessToken, TokenError>>>;

#[derive(Default)]
struct RefreshSlot {
    generation: u64,
    current: Option<RefreshFuture>,
}

type SharedSlot = Arc<Mutex<RefreshSlot>>;

fn lock_slot(slot: &Mutex<RefreshSlot>) -> MutexGuard<'_, RefreshSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties the slot when the refresh task finishes, panics or is cancelled.
///
/// A newer refresh may already occupy the slot; it is left alone.
struct SlotGuard {
    slot: SharedSlot,
    generation: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.slot);
        if slot.generation == self.generation {
            slot.current = None;
        }
    }
}

/// Coalesces concurrent token refresh demands onto one fetch.
pub struct TokenRefresher {
    source: Arc<dyn TokenSource>,
    credentials: Arc<CredentialsHandle>,
    slot: SharedSlot,
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("credentials", &self.credentials)
            .field("in_flight", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl TokenRefresher {
    /// Creates a refresher that publishes fetched tokens into `credentials`.
    #[must_use]
    pub fn new(source: Arc<dyn TokenSource>, credentials: Arc<CredentialsHandle>) -> Self {
        Self {
            source,
            credentials,
            slot: SharedSlot::default(),
        }
    }

    /// Returns the credential handle this refresher writes to.
    #[must_use]
    pub const fn credentials(&self) -> &Arc<CredentialsHandle> {
        &self.credentials
    }

    /// Returns `true` while a refresh is outstanding.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        lock_slot(&self.slot).current.is_some()
    }

    /// Obtains a fresh token, joining an outstanding refresh if there is one.
    ///
    /// Dropping the returned future does not cancel the fetch; the slot is
    /// released when the fetch itself ends.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] of the fetch this call joined; every
    /// waiter on the same fetch sees the same error.
    pub async fn refresh_once(&self) -> Result<AccessToken, TokenError> {
        let refresh = {
            let mut slot = lock_slot(&self.slot);
            if let Some(existing) = slot.current.as_ref() {
                tracing::debug!("joining in-flight token refresh");
                existing.clone()
            } else {
                slot.generation = slot.generation.wrapping_add(1);
                let refresh = self.start_refresh(slot.generation);
                slot.current = Some(refresh.clone());
                refresh
            }
        };

        refresh.await
    }

    /// Spawns the fetch. Must be called with the slot lock held so the
    /// task's guard cannot run before the future is stored.
    fn start_refresh(&self, generation: u64) -> RefreshFuture {
        let source = Arc::clone(&self.source);
        let credentials = Arc::clone(&self.credentials);
        let shop_id = credentials.snapshot().shop_id;
        let guard = SlotGuard {
            slot: Arc::clone(&self.slot),
            generation,
        };

        tracing::info!(shop_id = %shop_id, "refreshing partner access token");

        let task = tokio::spawn(async move {
            let _guard = guard;
            let token = source.fetch_token(shop_id).await?;
            credentials.replace_token(token.clone());
            Ok(token)
        });

        async move {
            match task.await {
                Ok(result) => {
                    if let Err(error) = &result {
                        tracing::warn!(%error, "token refresh failed");
                    }
                    result
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "token refresh task did not complete");
                    Err(TokenError::Abandoned)
                }
            }
        }
        .boxed()
        .shared()
    }
}
