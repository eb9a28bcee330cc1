//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around credential values that
//! validate their contents on construction. Invalid values are rejected with
//! clear error messages.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated partner identifier.
///
/// The marketplace issues numeric partner IDs; the decimal form is what
/// gets signed and sent on the wire.
///
/// # Example
///
/// ```rust
/// use partner_sync::PartnerId;
///
/// let id = PartnerId::new("2001887").unwrap();
/// assert_eq!(id.value(), 2_001_887);
/// assert_eq!(id.to_string(), "2001887");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PartnerId(i64);

impl PartnerId {
    /// Creates a new validated partner ID from its decimal form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPartnerId`] if the value is blank and
    /// [`ConfigError::InvalidPartnerId`] if it is not a positive integer.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(ConfigError::EmptyPartnerId);
        }
        match value.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(ConfigError::InvalidPartnerId {
                value: value.to_string(),
            }),
        }
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated partner secret (the HMAC signing key).
///
/// Surrounding whitespace is trimmed on construction, since keys pasted into
/// environment files frequently carry a trailing newline and the partner API
/// signs with the trimmed key.
///
/// # Security
///
/// The `Debug` implementation masks the secret value, displaying only
/// `PartnerSecret(*****)`.
///
/// ```rust
/// use partner_sync::PartnerSecret;
///
/// let secret = PartnerSecret::new("  my-secret\n").unwrap();
/// assert_eq!(secret.as_ref(), "my-secret");
/// assert_eq!(format!("{:?}", secret), "PartnerSecret(*****)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct PartnerSecret(String);

impl PartnerSecret {
    /// Creates a new validated partner secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyPartnerSecret`] if the key is empty after trimming.
    pub fn new(key: impl AsRef<str>) -> Result<Self, ConfigError> {
        let key = key.as_ref().trim();
        if key.is_empty() {
            return Err(ConfigError::EmptyPartnerSecret);
        }
        Ok(Self(key.to_string()))
    }
}

impl AsRef<str> for PartnerSecret {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PartnerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PartnerSecret(*****)")
    }
}

/// A validated shop identifier.
///
/// Serializes as a JSON number, matching the partner API and the
/// `shop_id` key column of the catalog tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShopId(i64);

impl ShopId {
    /// Creates a new validated shop ID from its decimal form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShopId`] if the value is not a positive integer.
    pub fn new(value: impl AsRef<str>) -> Result<Self, ConfigError> {
        let value = value.as_ref().trim();
        match value.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(ConfigError::InvalidShopId {
                value: value.to_string(),
            }),
        }
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ShopId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for ShopId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        Self::new(id.to_string()).map_err(de::Error::custom)
    }
}

/// A validated partner API host.
///
/// The host is the scheme plus authority only (`https://partner.example.com`
/// or `http://127.0.0.1:8080`). A trailing slash is stripped; anything that
/// looks like a path, query or fragment is rejected, because request paths
/// are signed separately and must not be mixed into the host.
///
/// # Example
///
/// ```rust
/// use partner_sync::ApiHost;
///
/// let host = ApiHost::new("https://partner.example.com/").unwrap();
/// assert_eq!(host.as_ref(), "https://partner.example.com");
/// assert_eq!(host.scheme(), "https");
/// assert_eq!(host.host_name(), "partner.example.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiHost {
    url: String,
    scheme_end: usize,
    host_end: usize,
}

impl ApiHost {
    /// Creates a new validated API host.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidApiHost`] if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, ConfigError> {
        let url = url.as_ref().trim().trim_end_matches('/').to_string();
        let invalid = || ConfigError::InvalidApiHost { url: url.clone() };

        let scheme_end = url.find("://").ok_or_else(invalid)?;
        let scheme = &url[..scheme_end];
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }

        let authority = &url[scheme_end + 3..];
        if authority.is_empty() || authority.contains(['/', '?', '#']) {
            return Err(invalid());
        }

        let host_end = authority
            .find(':')
            .map_or(url.len(), |i| scheme_end + 3 + i);
        if host_end == scheme_end + 3 {
            return Err(invalid());
        }

        Ok(Self {
            url,
            scheme_end,
            host_end,
        })
    }

    /// Returns the URL scheme (e.g., "https").
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Returns the host name portion of the URL, without port.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.url[self.scheme_end + 3..self.host_end]
    }

    /// Joins a request path (with leading `/`) onto the host.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }
}

impl AsRef<str> for ApiHost {
    fn as_ref(&self) -> &str {
        &self.url
    }
}
