//! Token-based refund service.
//!
//! A refund is requested with a compact token `header.payload.signature`,
//! each segment base64url without padding:
//!
//! - header: `{"alg":"<MD5|SHA256|SHA512>","typ":"JWT"}`
//! - payload: [`RefundPayload`] as minified JSON with sorted keys
//! - signature: raw digest of `MerchantLogin:OpKey:<payload>:password3`
//!
//! The service answers with JSON bodies that are checked here and turned into
//! [`RefundCreated`] and [`RefundStatus`].

use robokassa_proto::{
    InvoiceItem, JwtHeader, RefundCreateResponse, RefundLabel, RefundPayload,
    RefundStateResponse, TaxRate,
};
use rust_decimal::Decimal;
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::algorithm::SignatureAlgorithm;
use crate::canonical;
use crate::config::Credentials;
use crate::encoding::Base64UrlSegment;
use crate::error::{ApiError, RoboKassaError};
use crate::hash;
use crate::signature::SignatureValue;

const OPERATION: &str = "the refund service";

/// Creates a validated receipt line item.
///
/// # Errors
///
/// Returns [`RoboKassaError::Validation`] if `name` is blank, `quantity` is
/// not positive or `cost` is negative.
pub fn invoice_item(
    name: impl Into<String>,
    quantity: Decimal,
    cost: Decimal,
    tax: TaxRate,
) -> Result<InvoiceItem, RoboKassaError> {
    let name = name.into();
    if name.trim().is_empty() {
        return Err(RoboKassaError::validation("Item name cannot be empty"));
    }
    if quantity <= Decimal::ZERO {
        return Err(RoboKassaError::validation("Item quantity must be positive"));
    }
    if cost < Decimal::ZERO {
        return Err(RoboKassaError::validation("Item cost cannot be negative"));
    }
    Ok(InvoiceItem {
        name,
        quantity,
        cost,
        tax,
    })
}

/// Refund creation request for the token-based service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundV2Request {
    op_key: String,
    refund_sum: Option<Decimal>,
    invoice_items: Vec<InvoiceItem>,
    algorithm: Option<SignatureAlgorithm>,
}

impl RefundV2Request {
    /// Creates a full refund of the operation identified by `op_key`.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Validation`] if `op_key` is blank.
    pub fn new(op_key: impl Into<String>) -> Result<Self, RoboKassaError> {
        let op_key = op_key.into();
        if op_key.trim().is_empty() {
            return Err(RoboKassaError::validation("Operation key cannot be empty"));
        }
        Ok(Self {
            op_key,
            refund_sum: None,
            invoice_items: Vec::new(),
            algorithm: None,
        })
    }

    /// Turns the request into a partial refund of `refund_sum`.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Validation`] if `refund_sum` is not positive.
    pub fn with_refund_sum(mut self, refund_sum: Decimal) -> Result<Self, RoboKassaError> {
        if refund_sum <= Decimal::ZERO {
            return Err(RoboKassaError::validation("Refund amount must be positive"));
        }
        self.refund_sum = Some(refund_sum);
        Ok(self)
    }

    /// Appends a receipt line item.
    #[must_use]
    pub fn with_invoice_item(mut self, item: InvoiceItem) -> Self {
        self.invoice_items.push(item);
        self
    }

    /// Overrides the signature algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Returns the operation key.
    #[must_use]
    pub fn op_key(&self) -> &str {
        &self.op_key
    }

    /// Returns the partial amount, if any.
    #[must_use]
    pub const fn refund_sum(&self) -> Option<Decimal> {
        self.refund_sum
    }

    /// Returns the wire payload.
    #[must_use]
    pub fn payload(&self) -> RefundPayload {
        RefundPayload {
            op_key: self.op_key.clone(),
            refund_sum: self.refund_sum,
            invoice_items: (!self.invoice_items.is_empty()).then(|| self.invoice_items.clone()),
        }
    }
}

/// Builds the signed refund token for `request`.
///
/// # Errors
///
/// - [`RoboKassaError::Configuration`] if password3 is not configured
/// - [`RoboKassaError::Signature`] if the payload cannot be serialized
pub fn encode_refund_token(
    credentials: &Credentials,
    request: &RefundV2Request,
) -> Result<SignatureValue, RoboKassaError> {
    let password3 = credentials.require_password3(OPERATION)?;
    let algorithm = request.algorithm.unwrap_or_else(|| credentials.algorithm());

    let header = serde_json::to_value(JwtHeader::new(algorithm.as_str())).map_err(token_err)?;
    let payload = serde_json::to_value(request.payload()).map_err(token_err)?;
    let payload_json = canonical::canonical_json(&payload);

    let ctx = canonical::refund_token(credentials.merchant_login(), request.op_key(), &payload);
    let digest = hash::digest_bytes(algorithm, ctx.canonical_string(password3).as_bytes());

    Ok(SignatureValue::new(format!(
        "{}.{}.{}",
        Base64UrlSegment::encode(canonical::canonical_json(&header)),
        Base64UrlSegment::encode(payload_json),
        Base64UrlSegment::encode(digest),
    )))
}

/// Checks a refund token against the configured password3.
///
/// The algorithm is taken from the token header.
///
/// # Errors
///
/// - [`RoboKassaError::Configuration`] if password3 is not configured
/// - [`RoboKassaError::Signature`] if the token is not three decodable
///   segments or the payload has no `OpKey`
/// - [`RoboKassaError::InvalidSignatureAlgorithm`] for an unknown `alg`
pub fn verify_refund_token(credentials: &Credentials, token: &str) -> Result<bool, RoboKassaError> {
    let password3 = credentials.require_password3(OPERATION)?;

    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(RoboKassaError::signature("token must have three segments"));
    };

    let header: JwtHeader = decode_json(header)?;
    let algorithm: SignatureAlgorithm = header.alg.parse()?;
    let payload: Value = decode_json(payload)?;
    let op_key = payload
        .get("OpKey")
        .and_then(Value::as_str)
        .ok_or_else(|| RoboKassaError::signature("token payload has no OpKey"))?;
    let received = Base64UrlSegment::from(signature).decode().map_err(token_err)?;

    let ctx = canonical::refund_token(credentials.merchant_login(), op_key, &payload);
    let expected = hash::digest_bytes(algorithm, ctx.canonical_string(password3).as_bytes());
    Ok(expected.ct_eq(&received).into())
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, RoboKassaError> {
    let bytes = Base64UrlSegment::from(segment).decode().map_err(token_err)?;
    serde_json::from_slice(&bytes).map_err(token_err)
}

fn token_err(e: impl std::fmt::Display) -> RoboKassaError {
    RoboKassaError::signature(format!("refund token: {e}"))
}

/// An accepted refund creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundCreated {
    /// Always `true`; rejected requests become errors.
    pub success: bool,
    /// Identifier used to poll the refund state.
    pub request_id: Option<String>,
    /// Optional message from the service.
    pub message: Option<String>,
}

impl TryFrom<RefundCreateResponse> for RefundCreated {
    type Error = RoboKassaError;

    fn try_from(response: RefundCreateResponse) -> Result<Self, Self::Error> {
        if !response.success {
            let message = response.message.as_deref().unwrap_or("unknown error");
            return Err(ApiError::new(format!("Refund creation failed: {message}")).into());
        }
        Ok(Self {
            success: true,
            request_id: response.request_id,
            message: response.message,
        })
    }
}

/// State of a refund request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundStatus {
    /// Identifier of the refund request.
    pub request_id: String,
    /// Refunded amount.
    pub amount: Option<Decimal>,
    /// Parsed state.
    pub label: RefundLabel,
    /// State exactly as sent by the service.
    pub raw_label: String,
    /// Optional message from the service.
    pub message: Option<String>,
}

impl TryFrom<RefundStateResponse> for RefundStatus {
    type Error = RoboKassaError;

    fn try_from(response: RefundStateResponse) -> Result<Self, Self::Error> {
        match (response.request_id, response.label) {
            (Some(request_id), Some(raw_label)) => Ok(Self {
                request_id,
                amount: response.amount,
                label: RefundLabel::from_label(&raw_label),
                raw_label,
                message: response.message,
            }),
            _ => {
                let message = response.message.as_deref().unwrap_or("unknown error");
                Err(ApiError::new(format!("Failed to get refund status: {message}")).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("shop", "p1", "p2").unwrap().with_password3("p3")
    }

    fn decode_segment(segment: &str) -> Value {
        let bytes = Base64UrlSegment::from(segment).decode().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_token_has_three_segments() {
        let request = RefundV2Request::new("op-1").unwrap();
        let token = encode_refund_token(&creds(), &request).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(!token.as_str().contains('='));

        assert_eq!(
            decode_segment(parts[0]),
            serde_json::json!({"alg": "MD5", "typ": "JWT"})
        );
        assert_eq!(decode_segment(parts[1]), serde_json::json!({"OpKey": "op-1"}));
        assert_eq!(
            Base64UrlSegment::from(parts[2]).decode().unwrap().len(),
            16
        );
    }

    #[test]
    fn test_token_signature_covers_canonical_payload() {
        let request = RefundV2Request::new("op-2")
            .unwrap()
            .with_refund_sum("50.25".parse().unwrap())
            .unwrap()
            .with_algorithm(SignatureAlgorithm::Sha256);
        let token = encode_refund_token(&creds(), &request).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();

        let expected = hash::digest_bytes(
            SignatureAlgorithm::Sha256,
            br#"shop:op-2:{"OpKey":"op-2","RefundSum":50.25}:p3"#,
        );
        assert_eq!(Base64UrlSegment::from(parts[2]).decode().unwrap(), expected);
        assert!(verify_refund_token(&creds(), token.as_str()).unwrap());
    }

    #[test]
    fn test_token_with_invoice_items_verifies() {
        let item = invoice_item("Tea", Decimal::ONE, "50.25".parse().unwrap(), TaxRate::Vat20)
            .unwrap();
        let request = RefundV2Request::new("op-3")
            .unwrap()
            .with_invoice_item(item)
            .with_algorithm(SignatureAlgorithm::Sha512);
        let token = encode_refund_token(&creds(), &request).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();
        assert_eq!(decode_segment(parts[0])["alg"], "SHA512");
        assert_eq!(decode_segment(parts[1])["InvoiceItems"][0]["Tax"], "vat20");
        assert!(verify_refund_token(&creds(), token.as_str()).unwrap());
    }

    #[test]
    fn test_tampered_token_fails() {
        let request = RefundV2Request::new("op-1").unwrap();
        let token = encode_refund_token(&creds(), &request).unwrap();
        let parts: Vec<&str> = token.as_str().split('.').collect();
        let forged_payload = Base64UrlSegment::encode(r#"{"OpKey":"op-9"}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(!verify_refund_token(&creds(), &forged).unwrap());

        let other = Credentials::new("shop", "p1", "p2").unwrap().with_password3("other");
        assert!(!verify_refund_token(&other, token.as_str()).unwrap());
        assert!(verify_refund_token(&creds(), "a.b").is_err());
    }

    #[test]
    fn test_missing_password3_is_configuration_error() {
        let creds = Credentials::new("shop", "p1", "p2").unwrap();
        let request = RefundV2Request::new("op-1").unwrap();
        let err = encode_refund_token(&creds, &request).unwrap_err();
        assert!(matches!(err, RoboKassaError::Configuration(_)));
        assert!(err.to_string().contains("password3"));
    }

    #[test]
    fn test_request_validation() {
        assert!(RefundV2Request::new(" ").is_err());
        let request = RefundV2Request::new("op").unwrap();
        assert!(request.clone().with_refund_sum(Decimal::ZERO).is_err());
        assert!(invoice_item("", Decimal::ONE, Decimal::ONE, TaxRate::None).is_err());
        assert!(invoice_item("x", Decimal::ZERO, Decimal::ONE, TaxRate::None).is_err());
        assert!(invoice_item("x", Decimal::ONE, Decimal::NEGATIVE_ONE, TaxRate::None).is_err());
    }

    #[test]
    fn test_create_response_failure_message() {
        let response: RefundCreateResponse =
            serde_json::from_str(r#"{"success": false, "message": "Invalid operation key"}"#)
                .unwrap();
        let err = RefundCreated::try_from(response).unwrap_err();
        assert!(matches!(err, RoboKassaError::Api(_)));
        let text = err.to_string();
        assert!(text.contains("Refund creation failed"));
        assert!(text.contains("Invalid operation key"));
    }

    #[test]
    fn test_create_response_success() {
        let response: RefundCreateResponse =
            serde_json::from_str(r#"{"success": true, "requestId": "req-1"}"#).unwrap();
        let created = RefundCreated::try_from(response).unwrap();
        assert_eq!(created.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_state_response_mapping() {
        let response: RefundStateResponse = serde_json::from_str(
            r#"{"requestId": "req-1", "amount": 50.25, "label": "finished"}"#,
        )
        .unwrap();
        let status = RefundStatus::try_from(response).unwrap();
        assert_eq!(status.label, RefundLabel::Finished);
        assert_eq!(status.amount, Some(Decimal::new(5025, 2)));

        let response: RefundStateResponse =
            serde_json::from_str(r#"{"requestId": "req-2", "label": "on_hold"}"#).unwrap();
        let status = RefundStatus::try_from(response).unwrap();
        assert_eq!(status.label, RefundLabel::Unknown);
        assert_eq!(status.raw_label, "on_hold");
    }

    #[test]
    fn test_state_response_error() {
        let response: RefundStateResponse =
            serde_json::from_str(r#"{"message": "Request not found"}"#).unwrap();
        let err = RefundStatus::try_from(response).unwrap_err();
        assert!(err.to_string().contains("Failed to get refund status: Request not found"));
    }
}
