//! Payload types for the JWT-based refund service.
//!
//! The refund service receives a compact token whose payload segment is a
//! [`RefundPayload`] serialized as JSON with `PascalCase` keys.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// VAT rate of a fiscal receipt line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxRate {
    /// No VAT.
    None,
    /// VAT 0%.
    Vat0,
    /// VAT 10%.
    Vat10,
    /// VAT 10/110 (calculated rate).
    Vat110,
    /// VAT 20%.
    Vat20,
    /// VAT 20/120 (calculated rate).
    Vat120,
    /// VAT 5%.
    Vat5,
    /// VAT 7%.
    Vat7,
    /// VAT 5/105 (calculated rate).
    Vat105,
    /// VAT 7/107 (calculated rate).
    Vat107,
}

impl TaxRate {
    /// All rates accepted by the gateway.
    pub const ALL: [Self; 10] = [
        Self::None,
        Self::Vat0,
        Self::Vat10,
        Self::Vat110,
        Self::Vat20,
        Self::Vat120,
        Self::Vat5,
        Self::Vat7,
        Self::Vat105,
        Self::Vat107,
    ];

    /// Returns the wire representation (e.g. `"vat20"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Vat0 => "vat0",
            Self::Vat10 => "vat10",
            Self::Vat110 => "vat110",
            Self::Vat20 => "vat20",
            Self::Vat120 => "vat120",
            Self::Vat5 => "vat5",
            Self::Vat7 => "vat7",
            Self::Vat105 => "vat105",
            Self::Vat107 => "vat107",
        }
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known [`TaxRate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTaxRate(pub String);

impl fmt::Display for UnknownTaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tax rate: {}", self.0)
    }
}

impl std::error::Error for UnknownTaxRate {}

impl FromStr for TaxRate {
    type Err = UnknownTaxRate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|rate| rate.as_str() == lower)
            .ok_or_else(|| UnknownTaxRate(s.to_owned()))
    }
}

/// A line item of the fiscal receipt attached to a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceItem {
    /// Item name as printed on the receipt.
    pub name: String,

    /// Item quantity.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,

    /// Unit cost.
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,

    /// VAT rate.
    pub tax: TaxRate,
}

/// JSON payload of a refund creation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefundPayload {
    /// Operation key of the original payment.
    pub op_key: String,

    /// Partial refund amount. Absent for a full refund.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub refund_sum: Option<Decimal>,

    /// Receipt items being refunded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_items: Option<Vec<InvoiceItem>>,
}

/// Header segment of a refund creation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// Digest algorithm identifier (`MD5`, `SHA256` or `SHA512`).
    pub alg: String,

    /// Token type, always `JWT`.
    pub typ: String,
}

impl JwtHeader {
    /// Creates a header for the given algorithm identifier.
    #[must_use]
    pub fn new(alg: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            typ: "JWT".to_owned(),
        }
    }
}
