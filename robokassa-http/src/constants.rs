//! Default RoboKassa endpoints.

/// Merchant host serving the payment page and the XML web service.
pub const MERCHANT_BASE_URL: &str = "https://auth.robokassa.ru/";

/// Host of the token-based refund service.
pub const REFUND_SERVICE_BASE_URL: &str = "https://services.robokassa.ru/";

/// Payment page, relative to [`MERCHANT_BASE_URL`].
pub const PAYMENT_PATH: &str = "./Merchant/Index.aspx";

/// `POST` invoice creation, relative to [`MERCHANT_BASE_URL`].
pub const CREATE_INVOICE_PATH: &str = "./Merchant/WebService/Service.asmx/CreateInvoice";

/// `POST` refund, relative to [`MERCHANT_BASE_URL`].
pub const REFUND_PATH: &str = "./Merchant/WebService/Service.asmx/Refund";

/// `POST` refund status, relative to [`MERCHANT_BASE_URL`].
pub const REFUND_STATUS_PATH: &str = "./Merchant/WebService/Service.asmx/RefundStatus";

/// `POST` refund creation, relative to [`REFUND_SERVICE_BASE_URL`].
pub const REFUND_V2_CREATE_PATH: &str = "./RefundService/Refund/Create";

/// `GET` refund state, relative to [`REFUND_SERVICE_BASE_URL`].
pub const REFUND_V2_STATE_PATH: &str = "./RefundService/Refund/GetState";

/// Content type of XML web service requests.
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
