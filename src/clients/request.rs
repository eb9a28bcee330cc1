//! Request types for the partner API engine.
//!
//! A [`PartnerRequest`] is the engine's call contract: method, bare path,
//! which auth values to include, and extra parameters. It is validated when
//! built, so the engine only ever signs well-formed paths.
//!
//! Per attempt the engine derives a [`SignedRequestSpec`], which pins the
//! timestamp and produces the auth query parameters.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::signer;
use crate::auth::Credentials;

/// HTTP methods used by the partner API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    /// Parameters travel in the query string.
    Get,
    /// Parameters travel in a JSON body; auth stays in the query string.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Which optional auth values a request carries and signs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthFlags {
    /// Include and sign `access_token`.
    pub access_token: bool,
    /// Include and sign `shop_id`.
    pub shop_id: bool,
}

impl AuthFlags {
    /// Shop-level call: token and shop ID.
    #[must_use]
    pub const fn shop() -> Self {
        Self {
            access_token: true,
            shop_id: true,
        }
    }

    /// Public call: partner ID, timestamp and signature only.
    #[must_use]
    pub const fn public() -> Self {
        Self {
            access_token: false,
            shop_id: false,
        }
    }
}

/// Error returned when a request fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRequestError {
    /// The path does not start with `/`.
    #[error("Request path '{path}' must start with '/'.")]
    RelativePath {
        /// The offending path.
        path: String,
    },

    /// The path carries a scheme/host.
    #[error("Request path '{path}' must not include a host; the host comes from configuration.")]
    PathIncludesHost {
        /// The offending path.
        path: String,
    },

    /// The path carries a query string or fragment.
    #[error("Request path '{path}' must not include a query string; pass parameters separately.")]
    PathIncludesQuery {
        /// The offending path.
        path: String,
    },

    /// A reserved auth parameter was passed as an extra parameter.
    #[error("Parameter '{name}' is reserved for request signing.")]
    ReservedParameter {
        /// The reserved name.
        name: String,
    },
}

/// Parameter names the engine sets itself.
pub const RESERVED_PARAMS: [&str; 5] = ["partner_id", "timestamp", "sign", "access_token", "shop_id"];

/// A validated partner API request.
///
/// # Example
///
/// ```rust
/// use partner_sync::clients::{AuthFlags, HttpMethod, PartnerRequest};
///
/// let request = PartnerRequest::builder(HttpMethod::Get, "/api/v2/product/get_item_list")
///     .auth(AuthFlags::shop())
///     .param("offset", 0)
///     .param("page_size", 100)
///     .param("item_status", vec!["NORMAL", "UNLIST"])
///     .build()
///     .unwrap();
///
/// assert_eq!(request.path(), "/api/v2/product/get_item_list");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PartnerRequest {
    method: HttpMethod,
    path: String,
    auth: AuthFlags,
    params: Map<String, Value>,
}

impl PartnerRequest {
    /// Creates a new builder for constructing a `PartnerRequest`.
    #[must_use]
    pub fn builder(method: HttpMethod, path: impl Into<String>) -> PartnerRequestBuilder {
        PartnerRequestBuilder::new(method, path)
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the bare request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the auth flags.
    #[must_use]
    pub const fn auth(&self) -> AuthFlags {
        self.auth
    }

    /// Returns the extra parameters.
    #[must_use]
    pub const fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] if the path carries a host or query
    /// string, is not absolute, or if a reserved parameter name is used.
    pub fn verify(&self) -> Result<(), InvalidRequestError> {
        if self.path.contains("://") {
            return Err(InvalidRequestError::PathIncludesHost {
                path: self.path.clone(),
            });
        }
        if self.path.contains(['?', '#']) {
            return Err(InvalidRequestError::PathIncludesQuery {
                path: self.path.clone(),
            });
        }
        if !self.path.starts_with('/') {
            return Err(InvalidRequestError::RelativePath {
                path: self.path.clone(),
            });
        }
        if let Some(name) = self
            .params
            .keys()
            .find(|key| RESERVED_PARAMS.contains(&key.as_str()))
        {
            return Err(InvalidRequestError::ReservedParameter { name: name.clone() });
        }
        Ok(())
    }

    /// Returns the extra parameters encoded for a query string.
    ///
    /// `null` values are omitted. See [`encode_query_value`].
    #[must_use]
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter_map(|(key, value)| encode_query_value(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

/// Builder for [`PartnerRequest`].
#[derive(Debug)]
pub struct PartnerRequestBuilder {
    method: HttpMethod,
    path: String,
    auth: AuthFlags,
    params: Map<String, Value>,
}

impl PartnerRequestBuilder {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            auth: AuthFlags::shop(),
            params: Map::new(),
        }
    }

    /// Sets which auth values to include. Defaults to [`AuthFlags::shop`].
    #[must_use]
    pub const fn auth(mut self, auth: AuthFlags) -> Self {
        self.auth = auth;
        self
    }

    /// Adds a single parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Merges all entries of a JSON object into the parameters.
    #[must_use]
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params.extend(params);
        self
    }

    /// Builds the [`PartnerRequest`], validating it in the process.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] if the request fails validation.
    pub fn build(self) -> Result<PartnerRequest, InvalidRequestError> {
        let request = PartnerRequest {
            method: self.method,
            path: self.path,
            auth: self.auth,
            params: self.params,
        };
        request.verify()?;
        Ok(request)
    }
}

/// Encodes one parameter value for a query string.
///
/// - strings pass through unchanged
/// - numbers and booleans use their JSON text
/// - arrays of scalars become comma-separated values
/// - arrays containing objects or arrays, and plain objects, fall back to JSON
/// - `null` is omitted
#[must_use]
pub fn encode_query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(items) => {
            if items.iter().any(|item| item.is_object() || item.is_array()) {
                return Some(value.to_string());
            }
            Some(
                items
                    .iter()
                    .filter_map(encode_query_value)
                    .collect::<Vec<_>>()
                    .join(","),
            )
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

/// The per-attempt signing input: a request pinned to a timestamp.
///
/// Recreated on every attempt because the timestamp changes.
#[derive(Clone, Debug)]
pub struct SignedRequestSpec<'a> {
    /// HTTP method.
    pub method: HttpMethod,
    /// Bare path that gets signed.
    pub path: &'a str,
    /// Unix seconds.
    pub timestamp: i64,
    /// Which auth values to include.
    pub auth: AuthFlags,
    /// Extra parameters.
    pub params: &'a Map<String, Value>,
}

impl<'a> SignedRequestSpec<'a> {
    /// Pins `request` to `timestamp`.
    #[must_use]
    pub fn new(request: &'a PartnerRequest, timestamp: i64) -> Self {
        Self {
            method: request.method,
            path: &request.path,
            timestamp,
            auth: request.auth,
            params: &request.params,
        }
    }

    /// Signs the pinned request and returns the auth query parameters.
    ///
    /// A requested access token that the snapshot does not hold is omitted
    /// from both the signature and the query.
    #[must_use]
    pub fn auth_query(&self, credentials: &Credentials) -> Vec<(String, String)> {
        let token = if self.auth.access_token {
            credentials.access_token.as_ref().map(AsRef::as_ref)
        } else {
            None
        };
        let shop_id = self.auth.shop_id.then_some(credentials.shop_id);

        let sign = signer::sign(
            credentials.partner_id,
            &credentials.partner_secret,
            self.path,
            self.timestamp,
            token,
            shop_id,
        );

        let mut query = vec![
            ("partner_id".to_string(), credentials.partner_id.to_string()),
            ("timestamp".to_string(), self.timestamp.to_string()),
            ("sign".to_string(), sign),
        ];
        if let Some(token) = token {
            query.push(("access_token".to_string(), token.to_string()));
        }
        if let Some(shop_id) = shop_id {
            query.push(("shop_id".to_string(), shop_id.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccessToken;
    use crate::config::{ApiHost, PartnerId, PartnerSecret, ShopId};
    use serde_json::json;

    fn credentials(token: Option<&str>) -> Credentials {
        Credentials {
            partner_id: PartnerId::new("2001887").unwrap(),
            partner_secret: PartnerSecret::new("secret").unwrap(),
            host: ApiHost::new("https://partner.example.com").unwrap(),
            shop_id: ShopId::new("42").unwrap(),
            access_token: token.map(AccessToken::new),
        }
    }

    #[test]
    fn test_builder_defaults_to_shop_auth() {
        let request = PartnerRequest::builder(HttpMethod::Get, "/api/v2/shop/get_shop_info")
            .build()
            .unwrap();
        assert_eq!(request.auth(), AuthFlags::shop());
        assert!(request.params().is_empty());
    }

    #[test]
    fn test_verify_rejects_query_string_in_path() {
        let result =
            PartnerRequest::builder(HttpMethod::Get, "/api/v2/product/get_item_list?offset=0")
                .build();
        assert!(matches!(
            result,
            Err(InvalidRequestError::PathIncludesQuery { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_host_in_path() {
        let result = PartnerRequest::builder(
            HttpMethod::Get,
            "https://partner.example.com/api/v2/product/get_item_list",
        )
        .build();
        assert!(matches!(
            result,
            Err(InvalidRequestError::PathIncludesHost { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_relative_path_and_reserved_params() {
        assert!(matches!(
            PartnerRequest::builder(HttpMethod::Get, "api/v2/x").build(),
            Err(InvalidRequestError::RelativePath { .. })
        ));
        assert!(matches!(
            PartnerRequest::builder(HttpMethod::Get, "/api/v2/x")
                .param("sign", "forged")
                .build(),
            Err(InvalidRequestError::ReservedParameter { name }) if name == "sign"
        ));
    }

    #[test]
    fn test_encode_query_value_rules() {
        assert_eq!(encode_query_value(&json!("NORMAL")), Some("NORMAL".to_string()));
        assert_eq!(encode_query_value(&json!(100)), Some("100".to_string()));
        assert_eq!(encode_query_value(&json!(true)), Some("true".to_string()));
        assert_eq!(encode_query_value(&Value::Null), None);
        assert_eq!(
            encode_query_value(&json!([101, 102, 103])),
            Some("101,102,103".to_string())
        );
        assert_eq!(
            encode_query_value(&json!(["NORMAL", "UNLIST"])),
            Some("NORMAL,UNLIST".to_string())
        );
        assert_eq!(
            encode_query_value(&json!([{"model_id": 1}])),
            Some(r#"[{"model_id":1}]"#.to_string())
        );
        assert_eq!(
            encode_query_value(&json!({"a": 1})),
            Some(r#"{"a":1}"#.to_string())
        );
    }

    #[test]
    fn test_query_params_skip_nulls() {
        let request = PartnerRequest::builder(HttpMethod::Get, "/api/v2/x")
            .param("offset", 0)
            .param("cursor", Value::Null)
            .build()
            .unwrap();
        assert_eq!(
            request.query_params(),
            vec![("offset".to_string(), "0".to_string())]
        );
    }

    #[test]
    fn test_auth_query_includes_flags_and_valid_signature() {
        let request = PartnerRequest::builder(HttpMethod::Get, "/api/v2/x")
            .build()
            .unwrap();
        let creds = credentials(Some("tok"));
        let spec = SignedRequestSpec::new(&request, 1_700_000_000);
        let query = spec.auth_query(&creds);

        let get = |name: &str| {
            query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("partner_id").as_deref(), Some("2001887"));
        assert_eq!(get("timestamp").as_deref(), Some("1700000000"));
        assert_eq!(get("access_token").as_deref(), Some("tok"));
        assert_eq!(get("shop_id").as_deref(), Some("42"));
        assert_eq!(
            get("sign"),
            Some(signer::sign(
                creds.partner_id,
                &creds.partner_secret,
                "/api/v2/x",
                1_700_000_000,
                Some("tok"),
                Some(creds.shop_id),
            ))
        );
    }

    #[test]
    fn test_public_auth_query_omits_token_and_shop() {
        let request = PartnerRequest::builder(HttpMethod::Post, "/api/v2/auth/token/get")
            .auth(AuthFlags::public())
            .param("code", "abc")
            .build()
            .unwrap();
        let query = SignedRequestSpec::new(&request, 1).auth_query(&credentials(Some("tok")));
        let names: Vec<&str> = query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["partner_id", "timestamp", "sign"]);
    }
}
