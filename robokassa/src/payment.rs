//! Payment link assembly.
//!
//! A payment link is the gateway's payment page URL with the order fields and
//! a `SignatureValue` over `MerchantLogin:OutSum:InvId:password1[:Shp_*]`
//! in its query string.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use robokassa_proto::fields;
use rust_decimal::Decimal;
use url::Url;

use crate::algorithm::SignatureAlgorithm;
use crate::canonical;
use crate::config::Credentials;
use crate::error::RoboKassaError;
use crate::signature::{self, SignatureValue};

/// Default payment page endpoint.
pub const PAYMENT_BASE_URL: &str = "https://auth.robokassa.ru/Merchant/Index.aspx";

/// Payment page language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Culture {
    /// Russian (gateway default).
    #[default]
    Ru,
    /// English.
    En,
}

impl Culture {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Culture {
    type Err = RoboKassaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            other => Err(RoboKassaError::validation(format!(
                "unsupported culture: {other}"
            ))),
        }
    }
}

impl From<Culture> for String {
    fn from(culture: Culture) -> Self {
        culture.as_str().to_owned()
    }
}

/// Order fields of a payment link.
///
/// Validated on construction: the amount must be positive and the
/// description non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLinkRequest {
    out_sum: Decimal,
    description: String,
    inv_id: Option<u64>,
    email: Option<String>,
    culture: String,
    encoding: String,
    is_test: Option<bool>,
    expiration_date: Option<String>,
    user_parameters: BTreeMap<String, String>,
    algorithm: Option<SignatureAlgorithm>,
}

impl PaymentLinkRequest {
    /// Creates a request for `out_sum` with a customer-facing description.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Validation`] if `out_sum` is not positive or
    /// `description` is blank.
    pub fn new(out_sum: Decimal, description: impl Into<String>) -> Result<Self, RoboKassaError> {
        let description = description.into();
        if out_sum <= Decimal::ZERO {
            return Err(RoboKassaError::validation("Payment amount must be positive"));
        }
        if description.trim().is_empty() {
            return Err(RoboKassaError::validation("Description cannot be empty"));
        }
        Ok(Self {
            out_sum,
            description,
            inv_id: None,
            email: None,
            culture: Culture::default().into(),
            encoding: "utf-8".to_owned(),
            is_test: None,
            expiration_date: None,
            user_parameters: BTreeMap::new(),
            algorithm: None,
        })
    }

    /// Sets the merchant invoice number.
    #[must_use]
    pub const fn with_inv_id(mut self, inv_id: u64) -> Self {
        self.inv_id = Some(inv_id);
        self
    }

    /// Sets the customer email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the payment page language.
    #[must_use]
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = culture.into();
        self
    }

    /// Sets the parameter encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Overrides the test mode configured on the credentials.
    #[must_use]
    pub const fn with_test(mut self, is_test: bool) -> Self {
        self.is_test = Some(is_test);
        self
    }

    /// Sets the payment expiration date (ISO 8601, passed through verbatim).
    #[must_use]
    pub fn with_expiration_date(mut self, expiration_date: impl Into<String>) -> Self {
        self.expiration_date = Some(expiration_date.into());
        self
    }

    /// Adds a merchant extension parameter. The `Shp_` prefix is added when
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Validation`] if the name after the prefix is
    /// empty or holds anything but ASCII alphanumerics and `_`.
    pub fn with_user_parameter(
        mut self,
        key: &str,
        value: impl Into<String>,
    ) -> Result<Self, RoboKassaError> {
        self.user_parameters
            .insert(canonical::extension_key(key)?, value.into());
        Ok(self)
    }

    /// Overrides the signature algorithm configured on the credentials.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Returns the payment amount.
    #[must_use]
    pub const fn out_sum(&self) -> Decimal {
        self.out_sum
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the invoice number, if set.
    #[must_use]
    pub const fn inv_id(&self) -> Option<u64> {
        self.inv_id
    }

    /// Returns the extension parameters keyed with their `Shp_` prefix.
    #[must_use]
    pub const fn user_parameters(&self) -> &BTreeMap<String, String> {
        &self.user_parameters
    }

    /// Computes the `SignatureValue` of this request.
    #[must_use]
    pub fn signature(&self, credentials: &Credentials) -> SignatureValue {
        let out_sum = self.out_sum.to_string();
        let inv_id = self.inv_id.map(|id| id.to_string());
        let ctx = canonical::payment_link(
            credentials.merchant_login(),
            &out_sum,
            inv_id.as_deref(),
            &self.user_parameters,
        );
        let algorithm = self.algorithm.unwrap_or_else(|| credentials.algorithm());
        signature::sign(&ctx, algorithm, credentials.password1())
    }
}

/// Builds a signed payment link on the default payment page.
///
/// # Errors
///
/// See [`create_payment_url_with_base`].
pub fn create_payment_url(
    credentials: &Credentials,
    request: &PaymentLinkRequest,
) -> Result<String, RoboKassaError> {
    create_payment_url_with_base(PAYMENT_BASE_URL, credentials, request)
}

/// Builds a signed payment link on `base_url`.
///
/// Query parameters already present in `base_url` are kept; parameters set
/// by the request replace same-named ones.
///
/// # Errors
///
/// Returns [`RoboKassaError::Configuration`] if `base_url` is not a valid URL.
pub fn create_payment_url_with_base(
    base_url: &str,
    credentials: &Credentials,
    request: &PaymentLinkRequest,
) -> Result<String, RoboKassaError> {
    let signature = request.signature(credentials);
    let is_test = request.is_test.unwrap_or_else(|| credentials.test_mode());

    let mut params: Vec<(&str, Option<String>)> = vec![
        (fields::MERCHANT_LOGIN, Some(credentials.merchant_login().to_owned())),
        (fields::OUT_SUM, Some(request.out_sum.to_string())),
        (fields::INV_ID, request.inv_id.map(|id| id.to_string())),
        (fields::DESCRIPTION, Some(request.description.clone())),
        (fields::SIGNATURE_VALUE, Some(signature.into_inner())),
        (fields::CULTURE, Some(request.culture.clone())),
        (fields::ENCODING, Some(request.encoding.clone())),
        (fields::EMAIL, request.email.clone()),
        (fields::IS_TEST, is_test.then(|| "1".to_owned())),
        (fields::EXPIRATION_DATE, request.expiration_date.clone()),
    ];
    params.extend(
        request
            .user_parameters
            .iter()
            .map(|(k, v)| (k.as_str(), Some(v.clone()))),
    );

    build_url(base_url, &params)
}

/// Appends `params` to `base_url`, skipping `None` values.
///
/// Existing query parameters are preserved in place; a new value replaces
/// every existing occurrence of the same key.
///
/// # Errors
///
/// Returns [`RoboKassaError::Configuration`] if `base_url` cannot be parsed.
pub fn build_url(
    base_url: &str,
    params: &[(&str, Option<String>)],
) -> Result<String, RoboKassaError> {
    let mut url = Url::parse(base_url).map_err(|e| {
        RoboKassaError::configuration(format!("invalid base URL {base_url}: {e}"))
    })?;

    let mut present = params
        .iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
        .peekable();
    if present.peek().is_none() {
        return Ok(url.into());
    }

    let mut merged: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in present {
        if let Some(pos) = merged.iter().position(|(k, _)| k == key) {
            merged.retain(|(k, _)| k != key);
            merged.insert(pos, (key.to_owned(), value.to_owned()));
        } else {
            merged.push((key.to_owned(), value.to_owned()));
        }
    }

    url.query_pairs_mut()
        .clear()
        .extend_pairs(merged.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;

    fn creds() -> Credentials {
        Credentials::new("demo", "password1", "password2").unwrap()
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_new_validates_amount_and_description() {
        assert!(PaymentLinkRequest::new(Decimal::ZERO, "x").is_err());
        assert!(PaymentLinkRequest::new(Decimal::new(-1, 0), "x").is_err());
        assert!(PaymentLinkRequest::new(Decimal::ONE, "   ").is_err());
        assert!(PaymentLinkRequest::new(Decimal::ONE, "Order").is_ok());
    }

    #[test]
    fn test_payment_url_contains_signed_fields() {
        let request = PaymentLinkRequest::new(Decimal::new(10000, 2), "Order #42")
            .unwrap()
            .with_inv_id(42)
            .with_user_parameter("order", "abc")
            .unwrap();
        let url = create_payment_url(&creds(), &request).unwrap();
        assert!(url.starts_with(PAYMENT_BASE_URL));

        let pairs = query(&url);
        assert_eq!(param(&pairs, "MerchantLogin"), Some("demo"));
        assert_eq!(param(&pairs, "OutSum"), Some("100.00"));
        assert_eq!(param(&pairs, "InvId"), Some("42"));
        assert_eq!(param(&pairs, "Description"), Some("Order #42"));
        assert_eq!(param(&pairs, "Culture"), Some("ru"));
        assert_eq!(param(&pairs, "Encoding"), Some("utf-8"));
        assert_eq!(param(&pairs, "Shp_order"), Some("abc"));
        assert_eq!(param(&pairs, "IsTest"), None);
        assert_eq!(param(&pairs, "Email"), None);

        let expected = hash::digest(
            SignatureAlgorithm::Md5,
            b"demo:100.00:42:password1:Shp_order=abc",
        );
        assert_eq!(param(&pairs, "SignatureValue"), Some(expected.as_str()));
    }

    #[test]
    fn test_payment_url_without_inv_id_signs_empty_segment() {
        let request = PaymentLinkRequest::new(Decimal::new(5, 0), "Tip").unwrap();
        let url = create_payment_url(&creds(), &request).unwrap();
        let pairs = query(&url);
        assert_eq!(param(&pairs, "InvId"), None);
        let expected = hash::digest(SignatureAlgorithm::Md5, b"demo:5::password1");
        assert_eq!(param(&pairs, "SignatureValue"), Some(expected.as_str()));
    }

    #[test]
    fn test_payment_url_test_mode_and_algorithm_override() {
        let creds = creds().with_test_mode(true);
        let request = PaymentLinkRequest::new(Decimal::ONE, "x")
            .unwrap()
            .with_algorithm(SignatureAlgorithm::Sha256);
        let pairs = query(&create_payment_url(&creds, &request).unwrap());
        assert_eq!(param(&pairs, "IsTest"), Some("1"));
        assert_eq!(param(&pairs, "SignatureValue").unwrap().len(), 64);

        let request = request.with_test(false);
        let pairs = query(&create_payment_url(&creds, &request).unwrap());
        assert_eq!(param(&pairs, "IsTest"), None);
    }

    #[test]
    fn test_build_url_merges_existing_query() {
        let url = build_url(
            "https://pay.example/Index.aspx?keep=1&Culture=en&Culture=de",
            &[
                ("Culture", Some("ru".into())),
                ("Email", None),
                ("OutSum", Some("10".into())),
            ],
        )
        .unwrap();
        let pairs = query(&url);
        assert_eq!(
            pairs,
            vec![
                ("keep".to_owned(), "1".to_owned()),
                ("Culture".to_owned(), "ru".to_owned()),
                ("OutSum".to_owned(), "10".to_owned()),
            ]
        );
    }

    #[test]
    fn test_payment_link_rejects_invalid_extension_key() {
        let request = PaymentLinkRequest::new(Decimal::ONE, "Order").unwrap();
        for key in ["has space", "a&b=c", "Shp_"] {
            let err = request.clone().with_user_parameter(key, "1").unwrap_err();
            assert!(matches!(err, RoboKassaError::Validation(_)), "{key:?}");
        }
    }

    #[test]
    fn test_build_url_without_params_returns_base() {
        let base = "https://pay.example/Index.aspx?a=1";
        assert_eq!(build_url(base, &[("x", None)]).unwrap(), base);
    }

    #[test]
    fn test_build_url_rejects_invalid_base() {
        let err = build_url("not a url", &[("a", Some("1".into()))]).unwrap_err();
        assert!(matches!(err, RoboKassaError::Configuration(_)));
    }

    #[test]
    fn test_culture_parse() {
        assert_eq!("EN".parse::<Culture>().unwrap(), Culture::En);
        assert!("fr".parse::<Culture>().is_err());
    }
}
