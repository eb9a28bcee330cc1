//! Authentication for the partner API.
//!
//! # Overview
//!
//! - [`signer`]: HMAC-SHA256 request signatures
//! - [`Credentials`] / [`CredentialsHandle`]: immutable credential snapshots
//!   and the holder the refresh path publishes into
//! - [`TokenRefresher`]: single-flight bearer token refresh over a
//!   [`TokenSource`]
//! - [`TokenError`]: token fetch failures

mod credentials;
mod error;
pub mod signer;
mod token_refresh;

pub use credentials::{AccessToken, Credentials, CredentialsHandle};
pub use error::TokenError;
pub use token_refresh::{TokenRefresher, TokenSource};
