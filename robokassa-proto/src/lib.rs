//! Wire format types for the RoboKassa payment gateway.
//!
//! This crate defines the serialization-level data structures exchanged with
//! the gateway. It has minimal dependencies (`serde` and `rust_decimal`) and
//! is shared by the signing core and the HTTP client.
//!
//! # Modules
//!
//! - [`v2`] - JWT refund service payloads (`RefundPayload`, `InvoiceItem`, `TaxRate`)
//! - [`responses`] - JSON response bodies of the refund service
//! - [`fields`] - Field names used by payment links, notifications and XML documents

pub mod fields;
pub mod responses;
pub mod v2;

pub use responses::{RefundCreateResponse, RefundLabel, RefundStateResponse};
pub use v2::{InvoiceItem, JwtHeader, RefundPayload, TaxRate};

/// Prefix carried by every merchant-defined extension parameter.
pub const SHP_PREFIX: &str = "Shp_";

/// Returns `true` if `key` is a merchant extension parameter (`Shp_*`).
///
/// Matching is case-sensitive: `shp_a` and `SHP_a` are not extension
/// parameters.
#[must_use]
pub fn is_shp_key(key: &str) -> bool {
    key.starts_with(SHP_PREFIX)
}
