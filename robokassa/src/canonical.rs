//! Canonical strings hashed into signature values.
//!
//! Every signed message is a list of base segments, the secret, and then the
//! merchant extension parameters as `Shp_key=value` pairs sorted by key, all
//! joined with `:`:
//!
//! ```text
//! segment_1:...:segment_n:secret[:Shp_a=1:Shp_b=2]
//! ```
//!
//! The four gateway variants differ only in which base segments they carry:
//!
//! | variant | base segments | secret |
//! |---|---|---|
//! | payment link | `MerchantLogin:OutSum:InvId` | password1 |
//! | ResultURL / SuccessURL | `OutSum:InvId` | password2 / password1 |
//! | admin XML | `MerchantLogin[:OutSum]:InvId` | password1 |
//! | refund token | `MerchantLogin:OpKey:<payload json>` | password3 |

use std::collections::BTreeMap;

use robokassa_proto::{SHP_PREFIX, is_shp_key};
use serde_json::Value;

use crate::error::RoboKassaError;

/// Segment delimiter.
pub const DELIMITER: char = ':';

/// Ordered input of one canonical string.
///
/// Extension parameters are kept in a [`BTreeMap`], so the produced string
/// does not depend on the order in which the caller supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureContext {
    segments: Vec<String>,
    extensions: BTreeMap<String, String>,
}

impl SignatureContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a base segment. Empty segments keep their delimiter position.
    #[must_use]
    pub fn segment(mut self, value: impl Into<String>) -> Self {
        self.segments.push(value.into());
        self
    }

    /// Adds one extension parameter.
    ///
    /// Keys that do not start with `Shp_` are ignored.
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if is_shp_key(&key) {
            self.extensions.insert(key, value.into());
        }
        self
    }

    /// Adds extension parameters from any key/value iterator.
    ///
    /// Keys that do not start with `Shp_` are ignored.
    #[must_use]
    pub fn extensions<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        params.into_iter().fold(self, |ctx, (k, v)| {
            ctx.extension(k.as_ref(), v.as_ref())
        })
    }

    /// Returns the base segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the extension parameters sorted by key.
    #[must_use]
    pub const fn extension_params(&self) -> &BTreeMap<String, String> {
        &self.extensions
    }

    /// Renders the canonical string with `secret` placed after the base
    /// segments and before the extension parameters.
    #[must_use]
    pub fn canonical_string(&self, secret: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(segment);
            out.push(DELIMITER);
        }
        out.push_str(secret);
        for (key, value) in &self.extensions {
            out.push(DELIMITER);
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// Returns `key` with the `Shp_` prefix, adding it if missing.
#[must_use]
pub fn shp_key(key: &str) -> String {
    if is_shp_key(key) {
        key.to_owned()
    } else {
        format!("{SHP_PREFIX}{key}")
    }
}

/// Returns `key` with the `Shp_` prefix after checking it is usable as a
/// query name and an XML element name.
///
/// The part after the prefix must be non-empty ASCII alphanumerics or `_`.
///
/// # Errors
///
/// Returns [`RoboKassaError::Validation`] for any other key.
pub fn extension_key(key: &str) -> Result<String, RoboKassaError> {
    let full = shp_key(key);
    let name = &full[SHP_PREFIX.len()..];
    let valid = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    if name.is_empty() || !name.bytes().all(valid) {
        return Err(RoboKassaError::validation(format!(
            "Invalid extension parameter name: {key:?}"
        )));
    }
    Ok(full)
}

/// Context for signing a payment link: `MerchantLogin:OutSum:InvId`.
///
/// `inv_id` renders as an empty segment when absent.
#[must_use]
pub fn payment_link<I, K, V>(
    merchant_login: &str,
    out_sum: &str,
    inv_id: Option<&str>,
    extensions: I,
) -> SignatureContext
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    SignatureContext::new()
        .segment(merchant_login)
        .segment(out_sum)
        .segment(inv_id.unwrap_or_default())
        .extensions(extensions)
}

/// Context for verifying a ResultURL / SuccessURL notification: `OutSum:InvId`.
#[must_use]
pub fn notification<I, K, V>(out_sum: &str, inv_id: &str, extensions: I) -> SignatureContext
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    SignatureContext::new()
        .segment(out_sum)
        .segment(inv_id)
        .extensions(extensions)
}

/// Context for signing an admin XML request: `MerchantLogin[:OutSum]:InvId`.
///
/// `out_sum` is omitted entirely (segment and delimiter) when `None`.
#[must_use]
pub fn admin_xml(merchant_login: &str, out_sum: Option<&str>, inv_id: &str) -> SignatureContext {
    let ctx = SignatureContext::new().segment(merchant_login);
    let ctx = match out_sum {
        Some(sum) => ctx.segment(sum),
        None => ctx,
    };
    ctx.segment(inv_id)
}

/// Context for signing a refund token: `MerchantLogin:OpKey:<payload json>`.
///
/// The payload is rendered with [`canonical_json`].
#[must_use]
pub fn refund_token(merchant_login: &str, op_key: &str, payload: &Value) -> SignatureContext {
    SignatureContext::new()
        .segment(merchant_login)
        .segment(op_key)
        .segment(canonical_json(payload))
}

/// Serializes a JSON value minified, with object keys sorted recursively.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical_json(value, &mut out);
    out
}

fn write_canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical_json(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
