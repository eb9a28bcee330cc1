//! Configuration error types for the partner sync crate.
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. A missing credential at startup is fatal: callers
//! are expected to stop the process rather than continue with a partial
//! configuration.
//!
//! # Example
//!
//! ```rust
//! use partner_sync::{PartnerId, ConfigError};
//!
//! let result = PartnerId::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyPartnerId)));
//! ```

use thiserror::Error;

/// Errors that can occur while building or loading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Partner identifier cannot be empty.
    #[error("Partner ID cannot be empty. Please provide the partner ID issued by the marketplace.")]
    EmptyPartnerId,

    /// Partner identifier is not numeric.
    #[error("Invalid partner ID '{value}'. Expected a positive integer.")]
    InvalidPartnerId {
        /// The invalid value that was provided.
        value: String,
    },

    /// Partner secret cannot be empty.
    #[error("Partner secret cannot be empty. Please provide a valid partner key.")]
    EmptyPartnerSecret,

    /// Shop identifier is not numeric.
    #[error("Invalid shop ID '{value}'. Expected a positive integer.")]
    InvalidShopId {
        /// The invalid value that was provided.
        value: String,
    },

    /// API host URL is invalid.
    #[error("Invalid API host '{url}'. Please provide a URL with scheme and no path (e.g., 'https://partner.example.com').")]
    InvalidApiHost {
        /// The invalid URL that was provided.
        url: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// A numeric setting could not be parsed.
    #[error("Invalid value '{value}' for '{field}'.")]
    InvalidSetting {
        /// The setting name.
        field: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_partner_id_error_message() {
        let message = ConfigError::EmptyPartnerId.to_string();
        assert!(message.contains("Partner ID cannot be empty"));
    }

    #[test]
    fn test_missing_required_field_error_message() {
        let error = ConfigError::MissingRequiredField { field: "PARTNER_KEY" };
        let message = error.to_string();
        assert!(message.contains("PARTNER_KEY"));
        assert!(message.contains("must be set"));
    }

    #[test]
    fn test_invalid_api_host_error_message() {
        let error = ConfigError::InvalidApiHost {
            url: "partner.example.com".to_string(),
        };
        assert!(error.to_string().contains("partner.example.com"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let error = ConfigError::EmptyPartnerSecret;
        let _: &dyn std::error::Error = &error;
    }
}
