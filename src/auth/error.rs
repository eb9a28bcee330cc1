//! Errors raised while obtaining a bearer token.

use thiserror::Error;

use crate::config::ShopId;

/// Errors that can occur while fetching a fresh bearer token.
///
/// `TokenError` is `Clone` because a single refresh result is handed to
/// every caller that joined the in-flight refresh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token store holds no token for this shop.
    #[error("No access token stored for shop {shop_id}")]
    NotFound {
        /// The shop that was looked up.
        shop_id: ShopId,
    },

    /// The token store could not be queried.
    #[error("Token store lookup failed: {message}")]
    Store {
        /// Description of the underlying failure.
        message: String,
    },

    /// The refresh task ended without producing a result.
    #[error("Token refresh was abandoned before completing")]
    Abandoned,
}
