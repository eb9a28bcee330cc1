//! Request signing for the partner API.
//!
//! Every partner API call carries a `sign` query parameter: a lowercase hex
//! HMAC-SHA256 over the concatenation
//! `partner_id + path + timestamp + access_token? + shop_id?`, keyed by the
//! trimmed partner secret.
//!
//! The `path` must be the bare request path (`/api/v2/product/get_item_list`).
//! Signing a path that still carries a host or query string produces a
//! well-formed digest that the server rejects, which is why
//! [`PartnerRequest::verify`](crate::clients::PartnerRequest::verify) refuses
//! such paths before anything is signed.
//!
//! # Example
//!
//! ```rust
//! use partner_sync::auth::signer::sign;
//! use partner_sync::{PartnerId, PartnerSecret, ShopId};
//!
//! let sig = sign(
//!     PartnerId::new("2001887").unwrap(),
//!     &PartnerSecret::new("secret").unwrap(),
//!     "/api/v2/product/get_item_list",
//!     1_700_000_000,
//!     Some("access-token"),
//!     Some(ShopId::new("123456").unwrap()),
//! );
//! assert_eq!(sig.len(), 64);
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::{PartnerId, PartnerSecret, ShopId};

type HmacSha256 = Hmac<Sha256>;

/// Computes an HMAC-SHA256 signature for the given message.
///
/// The signature is returned as a lowercase hexadecimal string.
#[must_use]
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
pub fn compute_signature(message: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the string that gets signed for a request.
#[must_use]
pub fn base_string(
    partner_id: PartnerId,
    path: &str,
    timestamp: i64,
    access_token: Option<&str>,
    shop_id: Option<ShopId>,
) -> String {
    let mut base = format!("{partner_id}{path}{timestamp}");
    if let Some(token) = access_token {
        base.push_str(token);
    }
    if let Some(shop_id) = shop_id {
        base.push_str(&shop_id.to_string());
    }
    base
}

/// Signs a partner API request.
///
/// Pure and deterministic: identical inputs always give the identical
/// digest, and changing any one input changes it.
#[must_use]
pub fn sign(
    partner_id: PartnerId,
    partner_secret: &PartnerSecret,
    path: &str,
    timestamp: i64,
    access_token: Option<&str>,
    shop_id: Option<ShopId>,
) -> String {
    let base = base_string(partner_id, path, timestamp, access_token, shop_id);
    compute_signature(&base, partner_secret.as_ref().trim())
}
