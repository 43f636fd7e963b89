//! Error types for the HTTP client.

use http::StatusCode;
use robokassa::RoboKassaError;

/// Errors that can occur while talking to the gateway.
///
/// Transport failures (`Http`, `HttpStatus`, ...) are kept apart from
/// business failures reported by the gateway, which arrive as
/// [`ClientError::Core`] wrapping [`RoboKassaError::Api`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Signing, validation or gateway-reported failure.
    #[error(transparent)]
    Core(#[from] RoboKassaError),
}

impl ClientError {
    /// Returns `true` if the gateway answered and rejected the operation.
    #[must_use]
    pub const fn is_api_error(&self) -> bool {
        matches!(self, Self::Core(RoboKassaError::Api(_)))
    }
}
