#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Signing, verification and request assembly for the RoboKassa payment
//! gateway.
//!
//! This crate holds everything that does not touch the network: canonical
//! signature strings, digest computation, inbound notification checks, payment
//! link construction, admin XML documents and refund service tokens. The
//! `robokassa-http` crate sends the assembled requests.
//!
//! # Overview
//!
//! Every exchange with the gateway is authenticated by a digest of a
//! colon-delimited canonical string that ends with one of the shop's secrets.
//! Outgoing requests are signed with password1, ResultURL notifications are
//! checked with password2 and refund tokens are signed with password3.
//!
//! # Modules
//!
//! - [`algorithm`] - Supported digest algorithms
//! - [`canonical`] - Canonical string builders for every signed operation
//! - [`config`] - Shop credentials
//! - [`error`] - Error taxonomy
//! - [`notification`] - ResultURL / SuccessURL verification
//! - [`payment`] - Payment link assembly
//! - [`refund`] - Refund service tokens and responses
//! - [`signature`] - Signing and fixed-time verification
//! - [`xml`] - Admin XML requests and response validation
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing of signature mismatches

pub mod algorithm;
pub mod canonical;
pub mod config;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod notification;
pub mod payment;
pub mod refund;
pub mod signature;
pub mod xml;

pub use algorithm::SignatureAlgorithm;
pub use config::Credentials;
pub use error::{ApiError, InvalidSignatureAlgorithmError, RoboKassaError};
pub use notification::{Notification, parse_shp_params, verify_notification};
pub use payment::{Culture, PaymentLinkRequest, create_payment_url};
pub use refund::{RefundCreated, RefundStatus, RefundV2Request};
pub use signature::SignatureValue;
pub use xml::{InvoiceRequest, RefundRequest, RefundStatusRequest, XmlRequest, XmlResponse};
