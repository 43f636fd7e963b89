//! Error types for the RoboKassa SDK core.

use std::fmt;

use crate::algorithm::SignatureAlgorithm;

/// Base error type for signing, verification and response validation.
#[derive(Debug, thiserror::Error)]
pub enum RoboKassaError {
    /// Client setup is missing or invalid (e.g. no `password3` for v2 calls).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller input was rejected before any request was built.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unsupported signature algorithm selector.
    #[error("{0}")]
    InvalidSignatureAlgorithm(#[from] InvalidSignatureAlgorithmError),

    /// Signature could not be produced or checked.
    #[error("signature error: {0}")]
    Signature(String),

    /// The gateway returned a body that is not well-formed XML.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The gateway reported a business-level failure.
    #[error("{0}")]
    Api(#[from] ApiError),
}

impl RoboKassaError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a signature error.
    #[must_use]
    pub fn signature(message: impl Into<String>) -> Self {
        Self::Signature(message.into())
    }

    /// Creates an XML parse error from any displayable source.
    #[must_use]
    pub fn xml_parse(source: impl fmt::Display) -> Self {
        Self::XmlParse(source.to_string())
    }
}

/// Unsupported signature algorithm selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSignatureAlgorithmError {
    /// The selector as supplied by the caller.
    pub value: String,
}

impl InvalidSignatureAlgorithmError {
    /// Creates a new unsupported-algorithm error.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl fmt::Display for InvalidSignatureAlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported algorithm: {}. Supported: ", self.value)?;
        for (i, alg) in SignatureAlgorithm::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(alg.as_str())?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidSignatureAlgorithmError {}

/// Business-level failure reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Human-readable message, including the gateway's own description.
    pub message: String,
    /// Gateway result code (if any).
    pub code: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Sets the gateway result code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "{} (code {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_algorithm_lists_supported() {
        let err = InvalidSignatureAlgorithmError::new("sha1");
        assert_eq!(
            err.to_string(),
            "Unsupported algorithm: sha1. Supported: MD5, SHA256, SHA512"
        );
    }

    #[test]
    fn test_api_error_display_with_code() {
        let err = ApiError::new("Refund failed: Invoice not found").with_code("3");
        assert_eq!(err.to_string(), "Refund failed: Invoice not found (code 3)");

        let wrapped = RoboKassaError::from(err);
        assert!(wrapped.to_string().contains("Invoice not found"));
    }

    #[test]
    fn test_configuration_error_message() {
        let err = RoboKassaError::configuration("password3 is required for refund API");
        assert!(err.to_string().contains("password3"));
    }
}
