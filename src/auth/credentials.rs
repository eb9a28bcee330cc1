//! Credential snapshots for signed partner API calls.
//!
//! [`Credentials`] is immutable. A refresh never edits the token in place;
//! it publishes a new snapshot through [`CredentialsHandle::replace_token`].
//! Each engine attempt captures the snapshot current at its start, so a
//! request already signed and in flight keeps the token it was signed with.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{ApiHost, PartnerConfig, PartnerId, PartnerSecret, ShopId};

/// A bearer access token.
///
/// The `Debug` implementation masks the token value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(*****)")
    }
}

/// An immutable credential snapshot.
#[derive(Clone, Debug)]
pub struct Credentials {
    /// Partner identifier.
    pub partner_id: PartnerId,
    /// Partner signing secret.
    pub partner_secret: PartnerSecret,
    /// API host.
    pub host: ApiHost,
    /// Shop the calls act on.
    pub shop_id: ShopId,
    /// Current bearer token, if one has been obtained.
    pub access_token: Option<AccessToken>,
}

impl Credentials {
    /// Builds a token-less snapshot from configuration.
    #[must_use]
    pub fn from_config(config: &PartnerConfig) -> Self {
        Self {
            partner_id: config.partner_id(),
            partner_secret: config.partner_secret().clone(),
            host: config.host().clone(),
            shop_id: config.shop_id(),
            access_token: None,
        }
    }

    /// Returns a copy of this snapshot carrying `token`.
    #[must_use]
    pub fn with_token(&self, token: AccessToken) -> Self {
        Self {
            access_token: Some(token),
            ..self.clone()
        }
    }
}

/// Shared holder of the current [`Credentials`] snapshot.
///
/// Readers get an `Arc` to the snapshot and never hold the lock across an
/// await point.
#[derive(Debug)]
pub struct CredentialsHandle {
    current: RwLock<Arc<Credentials>>,
}

impl CredentialsHandle {
    /// Creates a handle holding `initial`.
    #[must_use]
    pub fn new(initial: Credentials) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Credentials> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publishes a new snapshot carrying `token` and returns it.
    pub fn replace_token(&self, token: AccessToken) -> Arc<Credentials> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(guard.with_token(token));
        *guard = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            partner_id: PartnerId::new("1").unwrap(),
            partner_secret: PartnerSecret::new("secret").unwrap(),
            host: ApiHost::new("https://partner.example.com").unwrap(),
            shop_id: ShopId::new("2").unwrap(),
            access_token: None,
        }
    }

    #[test]
    fn test_replace_token_publishes_new_snapshot() {
        let handle = CredentialsHandle::new(credentials());
        let before = handle.snapshot();

        handle.replace_token(AccessToken::new("fresh"));

        assert!(before.access_token.is_none());
        assert_eq!(
            handle.snapshot().access_token.as_ref().map(AsRef::as_ref),
            Some("fresh")
        );
    }

    #[test]
    fn test_access_token_debug_is_masked() {
        let snapshot = credentials().with_token(AccessToken::new("very-secret-token"));
        let debug_str = format!("{snapshot:?}");
        assert!(!debug_str.contains("very-secret-token"));
        assert!(!debug_str.contains("secret\""));
    }
}
