//! Async HTTP client for the RoboKassa payment gateway.
//!
//! [`RoboKassaClient`] pairs shop [`Credentials`](robokassa::Credentials) with
//! a `reqwest` client and exposes every gateway operation: payment links,
//! notification checks, invoices, refunds and refund status queries over both
//! the XML web service and the token-based refund service.
//!
//! # Modules
//!
//! - [`constants`] - Default gateway endpoints
//! - [`error`] - Transport error types
//! - [`client`] - The gateway client
//!
//! # Feature Flags
//!
//! - `telemetry` - Wraps every call in a tracing span

pub mod client;
pub mod constants;
pub mod error;

pub use client::{Endpoints, RoboKassaClient};
pub use error::ClientError;
