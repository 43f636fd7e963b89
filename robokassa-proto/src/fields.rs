//! Field and element names fixed by the gateway.
//!
//! The same names appear as query parameters of payment links, as keys of
//! inbound ResultURL / SuccessURL notifications and as XML element names of
//! admin-API requests.

/// Merchant login (shop identifier).
pub const MERCHANT_LOGIN: &str = "MerchantLogin";

/// Payment amount.
pub const OUT_SUM: &str = "OutSum";

/// Merchant invoice number.
pub const INV_ID: &str = "InvId";

/// Invoice number as spelled by the refund XML API.
pub const INVOICE_ID: &str = "InvoiceID";

/// Payment description shown to the customer.
pub const DESCRIPTION: &str = "Description";

/// Signature over the canonical string.
pub const SIGNATURE_VALUE: &str = "SignatureValue";

/// Payment page language.
pub const CULTURE: &str = "Culture";

/// Encoding of the payment page parameters.
pub const ENCODING: &str = "Encoding";

/// Customer email.
pub const EMAIL: &str = "Email";

/// Test mode flag (`1` enables test payments).
pub const IS_TEST: &str = "IsTest";

/// Payment expiration date.
pub const EXPIRATION_DATE: &str = "ExpirationDate";

/// Refund amount element of the XML refund request.
pub const AMOUNT: &str = "Amount";

/// Result code element of XML responses.
pub const CODE: &str = "Code";

/// Refund state element of XML status responses.
pub const STATE: &str = "State";
