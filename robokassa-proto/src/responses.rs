//! JSON response bodies of the refund service.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Response from `POST /Refund/Create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundCreateResponse {
    /// Whether the refund request was accepted. Absent means not accepted.
    #[serde(default)]
    pub success: bool,

    /// Identifier used to poll the refund state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Human-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response from `GET /Refund/GetState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundStateResponse {
    /// Identifier of the refund request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Refunded amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,

    /// Refund state label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Human-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// State of a refund request as reported by the `label` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundLabel {
    /// The refund is being processed.
    Processing,
    /// The refund completed.
    Finished,
    /// The refund failed.
    Error,
    /// Any label the gateway did not document.
    #[serde(other)]
    Unknown,
}

impl RefundLabel {
    /// Maps a raw label to its variant. Unrecognised labels map to
    /// [`RefundLabel::Unknown`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "processing" => Self::Processing,
            "finished" => Self::Finished,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` once the gateway will no longer change the state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl fmt::Display for RefundLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
