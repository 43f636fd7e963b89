//! Admin XML API: signed request documents and response validation.
//!
//! Request documents have a fixed root per operation and children in a fixed
//! order with `SignatureValue` always last. The signature covers
//! `MerchantLogin[:OutSum]:InvId:password1`:
//!
//! | root | children | signed |
//! |---|---|---|
//! | `InvoiceRequest` | `MerchantLogin`, `OutSum`, `InvId`, `Description`, `Email`?, `ExpirationDate`?, `Shp_*`? | `login:sum:inv:p1` |
//! | `RefundRequest` | `MerchantLogin`, `InvoiceID`, `Amount`? | `login[:amount]:inv:p1` |
//! | `RefundStatusRequest` | `MerchantLogin`, `InvoiceID` | `login:inv:p1` |
//!
//! Responses are flattened into a tag → text map; a non-zero `Code` becomes
//! an [`ApiError`] carrying the gateway's `Description`.

use std::collections::BTreeMap;
use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use robokassa_proto::fields;
use rust_decimal::Decimal;

use crate::algorithm::SignatureAlgorithm;
use crate::canonical::{self, SignatureContext};
use crate::config::Credentials;
use crate::error::{ApiError, RoboKassaError};
use crate::signature::{self, SignatureValue};

/// A signed admin-API request serialized as an XML document.
pub trait XmlRequest {
    /// Root element name.
    const ROOT: &'static str;

    /// Canonical input of the request signature.
    fn signature_context(&self, credentials: &Credentials) -> SignatureContext;

    /// Child elements in document order, excluding `SignatureValue`.
    fn elements(&self, credentials: &Credentials) -> Vec<(String, String)>;

    /// Per-request algorithm override.
    fn algorithm(&self) -> Option<SignatureAlgorithm>;

    /// Computes the request signature with password1.
    fn signature(&self, credentials: &Credentials) -> SignatureValue {
        let algorithm = self.algorithm().unwrap_or_else(|| credentials.algorithm());
        signature::sign(
            &self.signature_context(credentials),
            algorithm,
            credentials.password1(),
        )
    }

    /// Renders the signed XML document.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::XmlParse`] if the document cannot be written.
    fn to_xml(&self, credentials: &Credentials) -> Result<String, RoboKassaError> {
        let mut elements = self.elements(credentials);
        elements.push((
            fields::SIGNATURE_VALUE.to_owned(),
            self.signature(credentials).into_inner(),
        ));
        write_document(Self::ROOT, &elements)
    }
}

/// Invoice creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    out_sum: Decimal,
    description: String,
    inv_id: Option<u64>,
    email: Option<String>,
    expiration_date: Option<String>,
    user_parameters: BTreeMap<String, String>,
    algorithm: Option<SignatureAlgorithm>,
}

impl InvoiceRequest {
    /// Creates an invoice request.
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

    /// Sets the invoice expiration date.
    #[must_use]
    pub fn with_expiration_date(mut self, expiration_date: impl Into<String>) -> Self {
        self.expiration_date = Some(expiration_date.into());
        self
    }

    /// Adds a merchant extension parameter, emitted as a `Shp_*` element.
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

    /// Overrides the signature algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }
}

impl XmlRequest for InvoiceRequest {
    const ROOT: &'static str = "InvoiceRequest";

    fn signature_context(&self, credentials: &Credentials) -> SignatureContext {
        let inv_id = self.inv_id.map(|id| id.to_string()).unwrap_or_default();
        canonical::admin_xml(
            credentials.merchant_login(),
            Some(&self.out_sum.to_string()),
            &inv_id,
        )
    }

    fn elements(&self, credentials: &Credentials) -> Vec<(String, String)> {
        let mut out = vec![
            (fields::MERCHANT_LOGIN.to_owned(), credentials.merchant_login().to_owned()),
            (fields::OUT_SUM.to_owned(), self.out_sum.to_string()),
        ];
        if let Some(inv_id) = self.inv_id {
            out.push((fields::INV_ID.to_owned(), inv_id.to_string()));
        }
        out.push((fields::DESCRIPTION.to_owned(), self.description.clone()));
        if let Some(email) = &self.email {
            out.push((fields::EMAIL.to_owned(), email.clone()));
        }
        if let Some(date) = &self.expiration_date {
            out.push((fields::EXPIRATION_DATE.to_owned(), date.clone()));
        }
        out.extend(
            self.user_parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        out
    }

    fn algorithm(&self) -> Option<SignatureAlgorithm> {
        self.algorithm
    }
}

/// Refund request. Without an amount the whole payment is refunded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    invoice_id: u64,
    amount: Option<Decimal>,
    algorithm: Option<SignatureAlgorithm>,
}

impl RefundRequest {
    /// Creates a full refund request.
    #[must_use]
    pub const fn full(invoice_id: u64) -> Self {
        Self {
            invoice_id,
            amount: None,
            algorithm: None,
        }
    }

    /// Creates a partial refund request.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Validation`] if `amount` is not positive.
    pub fn partial(invoice_id: u64, amount: Decimal) -> Result<Self, RoboKassaError> {
        Self::new(invoice_id, Some(amount))
    }

    /// Creates a refund request; `None` refunds the full amount.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Validation`] if `amount` is given and not
    /// positive.
    pub fn new(invoice_id: u64, amount: Option<Decimal>) -> Result<Self, RoboKassaError> {
        if amount.is_some_and(|a| a <= Decimal::ZERO) {
            return Err(RoboKassaError::validation("Refund amount must be positive"));
        }
        Ok(Self {
            invoice_id,
            amount,
            algorithm: None,
        })
    }

    /// Overrides the signature algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Returns the invoice being refunded.
    #[must_use]
    pub const fn invoice_id(&self) -> u64 {
        self.invoice_id
    }

    /// Returns the partial amount, if any.
    #[must_use]
    pub const fn amount(&self) -> Option<Decimal> {
        self.amount
    }
}

impl XmlRequest for RefundRequest {
    const ROOT: &'static str = "RefundRequest";

    fn signature_context(&self, credentials: &Credentials) -> SignatureContext {
        let amount = self.amount.map(|a| a.to_string());
        canonical::admin_xml(
            credentials.merchant_login(),
            amount.as_deref(),
            &self.invoice_id.to_string(),
        )
    }

    fn elements(&self, credentials: &Credentials) -> Vec<(String, String)> {
        let mut out = vec![
            (fields::MERCHANT_LOGIN.to_owned(), credentials.merchant_login().to_owned()),
            (fields::INVOICE_ID.to_owned(), self.invoice_id.to_string()),
        ];
        if let Some(amount) = self.amount {
            out.push((fields::AMOUNT.to_owned(), amount.to_string()));
        }
        out
    }

    fn algorithm(&self) -> Option<SignatureAlgorithm> {
        self.algorithm
    }
}

/// Refund status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundStatusRequest {
    invoice_id: u64,
    algorithm: Option<SignatureAlgorithm>,
}

impl RefundStatusRequest {
    /// Creates a status query for `invoice_id`.
    #[must_use]
    pub const fn new(invoice_id: u64) -> Self {
        Self {
            invoice_id,
            algorithm: None,
        }
    }

    /// Overrides the signature algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }
}

impl XmlRequest for RefundStatusRequest {
    const ROOT: &'static str = "RefundStatusRequest";

    fn signature_context(&self, credentials: &Credentials) -> SignatureContext {
        canonical::admin_xml(
            credentials.merchant_login(),
            None,
            &self.invoice_id.to_string(),
        )
    }

    fn elements(&self, credentials: &Credentials) -> Vec<(String, String)> {
        vec![
            (fields::MERCHANT_LOGIN.to_owned(), credentials.merchant_login().to_owned()),
            (fields::INVOICE_ID.to_owned(), self.invoice_id.to_string()),
        ]
    }

    fn algorithm(&self) -> Option<SignatureAlgorithm> {
        self.algorithm
    }
}

fn write_document(root: &str, elements: &[(String, String)]) -> Result<String, RoboKassaError> {
    fn write_err(e: impl Display) -> RoboKassaError {
        RoboKassaError::xml_parse(format!("failed to write XML document: {e}"))
    }

    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_err)?;
    writer
        .write_event(Event::Start(BytesStart::new(root)))
        .map_err(write_err)?;
    for (name, text) in elements {
        writer
            .write_event(Event::Start(BytesStart::new(name.as_str())))
            .map_err(write_err)?;
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_err)?;
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(write_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(root)))
        .map_err(write_err)?;

    String::from_utf8(writer.into_inner()).map_err(write_err)
}

/// A gateway XML response flattened to element name → text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlResponse {
    root: String,
    fields: BTreeMap<String, String>,
}

impl XmlResponse {
    /// Returns the root element name.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the text of the first element named `tag`.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.get(tag).map(String::as_str)
    }

    /// Returns the `Code` element.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.get(fields::CODE)
    }

    /// Returns the `Description` element.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.get(fields::DESCRIPTION)
    }

    /// Returns the `State` element.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.get(fields::STATE)
    }

    /// Returns all flattened fields.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Consumes the response and returns the flattened fields.
    #[must_use]
    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }

    /// Returns `Ok(self)` if `Code` is absent or zero.
    ///
    /// # Errors
    ///
    /// Returns [`RoboKassaError::Api`] with `"<context>: <Description>"` if
    /// `Code` is anything but `0`.
    pub fn ensure_success(self, context: &str) -> Result<Self, RoboKassaError> {
        match self.code().map(str::trim) {
            None | Some("0") => Ok(self),
            Some(code) => {
                let description = self.description().unwrap_or("unknown error");
                Err(ApiError::new(format!("{context}: {description}"))
                    .with_code(code)
                    .into())
            }
        }
    }
}

/// Parses an XML body into a flat element → text map.
///
/// Nested elements are flattened; when a tag occurs more than once the first
/// occurrence wins. Container elements without text are not recorded.
///
/// # Errors
///
/// Returns [`RoboKassaError::XmlParse`] if the body is not a single
/// well-formed XML element.
pub fn parse_response(body: &str) -> Result<XmlResponse, RoboKassaError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut stack: Vec<(String, String)> = Vec::new();
    let mut fields = BTreeMap::new();

    loop {
        match reader.read_event().map_err(RoboKassaError::xml_parse)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if stack.is_empty() {
                    if root.is_some() {
                        return Err(RoboKassaError::xml_parse("multiple root elements"));
                    }
                    root = Some(name.clone());
                }
                stack.push((name, String::new()));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if stack.is_empty() {
                    if root.is_some() {
                        return Err(RoboKassaError::xml_parse("multiple root elements"));
                    }
                    root = Some(name);
                } else {
                    fields.entry(name).or_insert_with(String::new);
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(RoboKassaError::xml_parse)?;
                match stack.last_mut() {
                    Some((_, buf)) => buf.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(RoboKassaError::xml_parse("text outside root element")),
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some((_, buf)) = stack.last_mut() {
                    buf.push_str(&text);
                }
            }
            Event::End(_) => {
                let Some((name, text)) = stack.pop() else {
                    return Err(RoboKassaError::xml_parse("unexpected closing tag"));
                };
                if !text.is_empty() {
                    fields.entry(name).or_insert(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(RoboKassaError::xml_parse("unexpected end of document"));
    }
    let root = root.ok_or_else(|| RoboKassaError::xml_parse("document has no root element"))?;
    Ok(XmlResponse { root, fields })
}

/// Parses an XML body and rejects non-zero gateway codes.
///
/// # Errors
///
/// Returns [`RoboKassaError::XmlParse`] for malformed XML and
/// [`RoboKassaError::Api`] for a non-zero `Code`.
pub fn validate_response(body: &str, context: &str) -> Result<XmlResponse, RoboKassaError> {
    parse_response(body)?.ensure_success(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;

    const DECL: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

    fn creds() -> Credentials {
        Credentials::new("shop", "secret1", "secret2").unwrap()
    }

    #[test]
    fn test_full_refund_golden_document() {
        let xml = RefundRequest::full(12345).to_xml(&creds()).unwrap();
        let sig = hash::digest(SignatureAlgorithm::Md5, b"shop:12345:secret1");
        assert_eq!(
            xml,
            format!(
                "{DECL}<RefundRequest><MerchantLogin>shop</MerchantLogin>\
                 <InvoiceID>12345</InvoiceID><SignatureValue>{sig}</SignatureValue>\
                 </RefundRequest>"
            )
        );
        assert!(!xml.contains("<Amount>"));
    }

    #[test]
    fn test_partial_refund_golden_document() {
        let request = RefundRequest::partial(12345, "50.25".parse().unwrap()).unwrap();
        let xml = request.to_xml(&creds()).unwrap();
        let sig = hash::digest(SignatureAlgorithm::Md5, b"shop:50.25:12345:secret1");
        assert_eq!(
            xml,
            format!(
                "{DECL}<RefundRequest><MerchantLogin>shop</MerchantLogin>\
                 <InvoiceID>12345</InvoiceID><Amount>50.25</Amount>\
                 <SignatureValue>{sig}</SignatureValue></RefundRequest>"
            )
        );
    }

    #[test]
    fn test_partial_refund_keeps_decimal_text() {
        let request = RefundRequest::partial(1, "50.50".parse().unwrap()).unwrap();
        let xml = request.to_xml(&creds()).unwrap();
        assert!(xml.contains("<Amount>50.50</Amount>"));
    }

    #[test]
    fn test_refund_rejects_non_positive_amount() {
        assert!(RefundRequest::partial(1, Decimal::ZERO).is_err());
        assert!(RefundRequest::new(1, Some(Decimal::new(-5, 0))).is_err());
        assert!(RefundRequest::new(1, None).is_ok());
    }

    #[test]
    fn test_refund_status_golden_document() {
        let xml = RefundStatusRequest::new(12345).to_xml(&creds()).unwrap();
        let sig = hash::digest(SignatureAlgorithm::Md5, b"shop:12345:secret1");
        assert_eq!(
            xml,
            format!(
                "{DECL}<RefundStatusRequest><MerchantLogin>shop</MerchantLogin>\
                 <InvoiceID>12345</InvoiceID><SignatureValue>{sig}</SignatureValue>\
                 </RefundStatusRequest>"
            )
        );
    }

    #[test]
    fn test_invoice_golden_document() {
        let request = InvoiceRequest::new("100.00".parse().unwrap(), "Tea & <cakes>")
            .unwrap()
            .with_inv_id(7)
            .with_email("a@b.c")
            .with_user_parameter("order", "9")
            .unwrap();
        let xml = request.to_xml(&creds()).unwrap();
        let sig = hash::digest(SignatureAlgorithm::Md5, b"shop:100.00:7:secret1");
        assert_eq!(
            xml,
            format!(
                "{DECL}<InvoiceRequest><MerchantLogin>shop</MerchantLogin>\
                 <OutSum>100.00</OutSum><InvId>7</InvId>\
                 <Description>Tea &amp; &lt;cakes&gt;</Description><Email>a@b.c</Email>\
                 <Shp_order>9</Shp_order><SignatureValue>{sig}</SignatureValue>\
                 </InvoiceRequest>"
            )
        );
    }

    #[test]
    fn test_invoice_rejects_invalid_extension_key() {
        let request = InvoiceRequest::new(Decimal::TEN, "x").unwrap();
        let err = request
            .clone()
            .with_user_parameter("a><MerchantLogin>evil</MerchantLogin><Shp_b", "1")
            .unwrap_err();
        assert!(matches!(err, RoboKassaError::Validation(_)));
        assert!(request.with_user_parameter("has space", "1").is_err());
    }

    #[test]
    fn test_invoice_validation() {
        assert!(InvoiceRequest::new(Decimal::ZERO, "x").is_err());
        assert!(InvoiceRequest::new(Decimal::ONE, "").is_err());
    }

    #[test]
    fn test_sha512_refund_signature_is_128_hex() {
        let request = RefundRequest::partial(12345, "50.25".parse().unwrap())
            .unwrap()
            .with_algorithm(SignatureAlgorithm::Sha512);
        let creds = creds();
        let sig = request.signature(&creds);
        assert_eq!(sig.as_str().len(), 128);
        assert!(signature::verify(
            &request.signature_context(&creds),
            SignatureAlgorithm::Sha512,
            "secret1",
            sig.as_str()
        ));
        let xml = request.to_xml(&creds).unwrap();
        let parsed = parse_response(&xml).unwrap();
        assert_eq!(parsed.root(), "RefundRequest");
        assert_eq!(parsed.get("SignatureValue"), Some(sig.as_str()));
    }

    #[test]
    fn test_parse_response_flat_map() {
        let parsed = parse_response(
            r#"<?xml version="1.0"?><Response><Code>0</Code><Description>Success</Description></Response>"#,
        )
        .unwrap();
        assert_eq!(parsed.root(), "Response");
        assert_eq!(parsed.code(), Some("0"));
        assert_eq!(parsed.description(), Some("Success"));
    }

    #[test]
    fn test_parse_response_flattens_nested_elements() {
        let parsed = parse_response(
            "<OperationStateResponse><Result><Code>0</Code></Result>\
             <State><Code>100</Code><StateDate>2024-01-01</StateDate></State></OperationStateResponse>",
        )
        .unwrap();
        assert_eq!(parsed.code(), Some("0"));
        assert_eq!(parsed.get("StateDate"), Some("2024-01-01"));
        assert!(parsed.get("Result").is_none());
    }

    #[test]
    fn test_parse_response_unescapes_and_keeps_empty_elements() {
        let parsed = parse_response("<R><Description>A &amp; B</Description><Note/></R>").unwrap();
        assert_eq!(parsed.description(), Some("A & B"));
        assert_eq!(parsed.get("Note"), Some(""));
    }

    #[test]
    fn test_parse_response_self_closing_root_has_no_fields() {
        let parsed = parse_response("<Response/>").unwrap();
        assert_eq!(parsed.root(), "Response");
        assert!(parsed.fields().is_empty());
    }

    #[test]
    fn test_parse_response_rejects_malformed() {
        for body in [
            "",
            "not xml",
            "<Response><Code>0</Code>",
            "<Response><Code>0</Description></Response>",
            "<A/><B/>",
        ] {
            let err = parse_response(body).unwrap_err();
            assert!(matches!(err, RoboKassaError::XmlParse(_)), "body: {body:?}");
        }
    }

    #[test]
    fn test_validate_response_non_zero_code() {
        let err = validate_response(
            "<Response><Code>3</Code><Description>Invoice not found</Description></Response>",
            "Refund failed",
        )
        .unwrap_err();
        match err {
            RoboKassaError::Api(api) => {
                assert_eq!(api.code.as_deref(), Some("3"));
                assert!(api.message.contains("Refund failed"));
                assert!(api.message.contains("Invoice not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_response_success() {
        let parsed = validate_response(
            "<Response><Code>0</Code><State>5</State></Response>",
            "Refund status failed",
        )
        .unwrap();
        assert_eq!(parsed.state(), Some("5"));
    }
}
