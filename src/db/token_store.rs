//! Bearer tokens stored in `partner_tokens`.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::{AccessToken, TokenError, TokenSource};
use crate::config::ShopId;
use crate::db::{retry_transient_once, DatabaseError};

/// Reads the current bearer token for a shop from `PostgreSQL`.
///
/// Tokens are written by the external authorization flow; this store only
/// reads them. Transient connection failures are retried once.
#[derive(Clone, Debug)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    /// Creates a token store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Looks up the stored token for `shop_id`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails (after one retry for
    /// transient failures).
    pub async fn lookup(&self, shop_id: ShopId) -> Result<Option<String>, DatabaseError> {
        retry_transient_once("fetch_access_token", || async {
            let token: Option<String> = sqlx::query_scalar(
                "SELECT access_token FROM partner_tokens WHERE shop_id = $1",
            )
            .bind(shop_id.value())
            .fetch_optional(&self.pool)
            .await?;
            Ok(token)
        })
        .await
    }
}

#[async_trait]
impl TokenSource for PgTokenStore {
    async fn fetch_token(&self, shop_id: ShopId) -> Result<AccessToken, TokenError> {
        match self.lookup(shop_id).await {
            Ok(Some(token)) if !token.trim().is_empty() => Ok(AccessToken::new(token)),
            Ok(_) => Err(TokenError::NotFound { shop_id }),
            Err(error) => Err(TokenError::Store {
                message: error.to_string(),
            }),
        }
    }
}
