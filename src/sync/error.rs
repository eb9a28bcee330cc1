//! Errors raised by the catalog sync.

use thiserror::Error;

use crate::clients::{BusinessError, InvalidRequestError, TransportError};
use crate::db::UpsertError;

/// Errors that can occur while listing, fetching or persisting the catalog.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A partner API call failed below the business layer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The partner API answered with a business error.
    #[error(transparent)]
    Business(#[from] BusinessError),

    /// A request could not be built.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequestError),

    /// A caller passed an argument the endpoint does not accept.
    #[error("Invalid argument for {endpoint}: {message}")]
    InvalidArgument {
        /// The endpoint path.
        endpoint: &'static str,
        /// What was wrong.
        message: String,
    },

    /// A response payload did not have the expected shape.
    #[error("Unexpected payload from {endpoint}: {message}")]
    InvalidPayload {
        /// The endpoint path.
        endpoint: &'static str,
        /// What was wrong.
        message: String,
    },

    /// Persisting records failed.
    #[error(transparent)]
    Upsert(#[from] UpsertError),
}
