//! Verification of inbound ResultURL / SuccessURL notifications.
//!
//! The gateway signs `OutSum:InvId:<secret>[:Shp_key=value...]` and sends the
//! digest as `SignatureValue`. ResultURL uses password2, SuccessURL uses
//! password1. Verification fails closed: a missing field, an unparseable
//! amount or an empty signature is an error, never an accepted notification.

use std::collections::BTreeMap;

use robokassa_proto::{SHP_PREFIX, fields};
use rust_decimal::Decimal;

use crate::algorithm::SignatureAlgorithm;
use crate::canonical;
use crate::config::Credentials;
use crate::error::RoboKassaError;
use crate::signature;

/// Extracts `Shp_*` parameters from an inbound field map, with the prefix
/// removed.
#[must_use]
pub fn parse_shp_params<I, K, V>(raw: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|(k, v)| {
            k.as_ref()
                .strip_prefix(SHP_PREFIX)
                .map(|name| (name.to_owned(), v.as_ref().to_owned()))
        })
        .collect()
}

/// A payment notification as received on ResultURL or SuccessURL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Amount exactly as received.
    pub out_sum: String,
    /// Invoice number exactly as received.
    pub inv_id: String,
    /// Signature sent by the gateway.
    pub signature_value: String,
    /// Extension parameters, `Shp_` prefix removed.
    pub shp_params: BTreeMap<String, String>,
}

impl Notification {
    /// Builds a notification from raw query or form fields.
    ///
    /// Unknown fields are ignored; only `Shp_*` keys become extension
    /// parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Validation`] if `OutSum`, `InvId` or
    /// `SignatureValue` is missing.
    pub fn from_fields<I, K, V>(raw: I) -> Result<Self, RoboKassaError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut out_sum = None;
        let mut inv_id = None;
        let mut signature_value = None;
        let mut shp_params = BTreeMap::new();

        for (key, value) in raw {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                fields::OUT_SUM => out_sum = Some(value.to_owned()),
                fields::INV_ID => inv_id = Some(value.to_owned()),
                fields::SIGNATURE_VALUE => signature_value = Some(value.to_owned()),
                _ => {
                    if let Some(name) = key.strip_prefix(SHP_PREFIX) {
                        shp_params.insert(name.to_owned(), value.to_owned());
                    }
                }
            }
        }

        Ok(Self {
            out_sum: out_sum.ok_or_else(|| missing(fields::OUT_SUM))?,
            inv_id: inv_id.ok_or_else(|| missing(fields::INV_ID))?,
            signature_value: signature_value.ok_or_else(|| missing(fields::SIGNATURE_VALUE))?,
            shp_params,
        })
    }

    /// Checks the notification signature against `secret`.
    ///
    /// # Errors
    ///
    /// - [`RoboKassaError::Validation`] if `OutSum` is not a decimal amount or
    ///   `InvId` is blank
    /// - [`RoboKassaError::Signature`] if `SignatureValue` is empty
    pub fn verify(
        &self,
        secret: &str,
        algorithm: SignatureAlgorithm,
    ) -> Result<bool, RoboKassaError> {
        if self.out_sum.trim().parse::<Decimal>().is_err() {
            return Err(RoboKassaError::validation(format!(
                "invalid OutSum: {:?}",
                self.out_sum
            )));
        }
        if self.inv_id.trim().is_empty() {
            return Err(missing(fields::INV_ID));
        }
        if self.signature_value.trim().is_empty() {
            return Err(RoboKassaError::signature("empty SignatureValue"));
        }

        let extensions = self
            .shp_params
            .iter()
            .map(|(k, v)| (format!("{SHP_PREFIX}{k}"), v.as_str()));
        let ctx = canonical::notification(&self.out_sum, &self.inv_id, extensions);
        let valid = signature::verify(&ctx, algorithm, secret, &self.signature_value);

        #[cfg(feature = "telemetry")]
        if !valid {
            tracing::warn!(inv_id = %self.inv_id, %algorithm, "notification signature mismatch");
        }

        Ok(valid)
    }

    /// Verifies a ResultURL notification (password2).
    ///
    /// # Errors
    ///
    /// See [`Notification::verify`].
    pub fn verify_result(&self, credentials: &Credentials) -> Result<bool, RoboKassaError> {
        self.verify(credentials.password2(), credentials.algorithm())
    }

    /// Verifies a SuccessURL redirect (password1).
    ///
    /// # Errors
    ///
    /// See [`Notification::verify`].
    pub fn verify_success(&self, credentials: &Credentials) -> Result<bool, RoboKassaError> {
        self.verify(credentials.password1(), credentials.algorithm())
    }
}

/// Verifies a notification given as raw fields.
///
/// # Errors
///
/// Returns an error if required fields are missing or malformed; see
/// [`Notification::from_fields`] and [`Notification::verify`].
pub fn verify_notification<I, K, V>(
    raw: I,
    secret: &str,
    algorithm: SignatureAlgorithm,
) -> Result<bool, RoboKassaError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    Notification::from_fields(raw)?.verify(secret, algorithm)
}

fn missing(field: &str) -> RoboKassaError {
    RoboKassaError::validation(format!("missing required field: {field}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::hash;

    fn signed_fields(canonical: &str, alg: SignatureAlgorithm) -> Vec<(String, String)> {
        vec![
            ("OutSum".into(), "100.00".into()),
            ("InvId".into(), "42".into()),
            ("Shp_a".into(), "1".into()),
            ("Shp_b".into(), "2".into()),
            ("SignatureValue".into(), hash::digest(alg, canonical.as_bytes())),
        ]
    }

    #[test]
    fn test_result_url_with_shp_params_verifies() {
        let fields = signed_fields("100.00:42:password2:Shp_a=1:Shp_b=2", SignatureAlgorithm::Md5);
        assert!(verify_notification(fields, "password2", SignatureAlgorithm::Md5).unwrap());
    }

    #[test]
    fn test_shp_reordering_does_not_change_verdict() {
        let mut fields =
            signed_fields("100.00:42:password2:Shp_a=1:Shp_b=2", SignatureAlgorithm::Sha256);
        fields.reverse();
        assert!(
            verify_notification(fields.clone(), "password2", SignatureAlgorithm::Sha256).unwrap()
        );

        let map: HashMap<String, String> = fields.into_iter().collect();
        assert!(verify_notification(&map, "password2", SignatureAlgorithm::Sha256).unwrap());
    }

    #[test]
    fn test_uppercase_signature_verifies() {
        let mut fields =
            signed_fields("100.00:42:password2:Shp_a=1:Shp_b=2", SignatureAlgorithm::Md5);
        let sig = fields.last_mut().unwrap();
        sig.1 = sig.1.to_ascii_uppercase();
        assert!(verify_notification(fields, "password2", SignatureAlgorithm::Md5).unwrap());
    }

    #[test]
    fn test_wrong_secret_or_tampered_field_fails() {
        let fields = signed_fields("100.00:42:password2:Shp_a=1:Shp_b=2", SignatureAlgorithm::Md5);
        assert!(
            !verify_notification(fields.clone(), "password1", SignatureAlgorithm::Md5).unwrap()
        );

        let mut tampered = fields.clone();
        tampered[0].1 = "1000.00".into();
        assert!(!verify_notification(tampered, "password2", SignatureAlgorithm::Md5).unwrap());

        let mut extra = fields;
        extra.push(("Shp_c".into(), "3".into()));
        assert!(!verify_notification(extra, "password2", SignatureAlgorithm::Md5).unwrap());
    }

    #[test]
    fn test_missing_fields_fail_closed() {
        let fields = [("OutSum", "1.00"), ("InvId", "1")];
        let err = verify_notification(fields, "p2", SignatureAlgorithm::Md5).unwrap_err();
        assert!(matches!(err, RoboKassaError::Validation(_)));
        assert!(err.to_string().contains("SignatureValue"));

        let fields = [("InvId", "1"), ("SignatureValue", "abc")];
        assert!(verify_notification(fields, "p2", SignatureAlgorithm::Md5).is_err());
    }

    #[test]
    fn test_unparseable_amount_and_empty_signature_fail_closed() {
        let fields = [("OutSum", "abc"), ("InvId", "1"), ("SignatureValue", "ff")];
        let err = verify_notification(fields, "p2", SignatureAlgorithm::Md5).unwrap_err();
        assert!(matches!(err, RoboKassaError::Validation(_)));

        let fields = [("OutSum", "1.00"), ("InvId", "1"), ("SignatureValue", "")];
        let err = verify_notification(fields, "p2", SignatureAlgorithm::Md5).unwrap_err();
        assert!(matches!(err, RoboKassaError::Signature(_)));
    }

    #[test]
    fn test_success_url_uses_password1() {
        let creds = Credentials::new("demo", "password1", "password2").unwrap();
        let sig = hash::digest(SignatureAlgorithm::Md5, b"15.50:9:password1");
        let notification = Notification::from_fields([
            ("OutSum", "15.50"),
            ("InvId", "9"),
            ("SignatureValue", sig.as_str()),
        ])
        .unwrap();
        assert!(notification.verify_success(&creds).unwrap());
        assert!(!notification.verify_result(&creds).unwrap());
    }

    #[test]
    fn test_parse_shp_params_strips_prefix() {
        let params = parse_shp_params([
            ("Shp_user", "7"),
            ("OutSum", "1"),
            ("shp_lower", "x"),
            ("Shp_", "empty"),
        ]);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("user").map(String::as_str), Some("7"));
        assert_eq!(params.get("").map(String::as_str), Some("empty"));
    }
}
