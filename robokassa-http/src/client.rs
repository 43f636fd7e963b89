//! An async client for the RoboKassa gateway.
//!
//! [`RoboKassaClient`] signs requests with the core crate and sends them with
//! `reqwest`:
//!
//! - the XML web service (`CreateInvoice`, `Refund`, `RefundStatus`) receives
//!   signed XML documents and answers with XML
//! - the refund service receives a signed token as a JSON string and answers
//!   with JSON
//!
//! ## Error Handling
//!
//! A non-success HTTP status is a transport failure
//! ([`ClientError::HttpStatus`]). A well-formed answer that rejects the
//! operation is a gateway failure ([`ClientError::Core`]).

use std::time::Duration;

use http::StatusCode;
use http::header::CONTENT_TYPE;
use reqwest::Client;
use robokassa::notification::Notification;
use robokassa::payment::{PaymentLinkRequest, create_payment_url_with_base};
use robokassa::refund::{self, RefundCreated, RefundStatus, RefundV2Request};
use robokassa::xml::{
    self, InvoiceRequest, RefundRequest, RefundStatusRequest, XmlRequest, XmlResponse,
};
use robokassa::Credentials;
use robokassa_proto::{RefundCreateResponse, RefundStateResponse};
use std::fmt::Display;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

use crate::constants::{
    CREATE_INVOICE_PATH, MERCHANT_BASE_URL, PAYMENT_PATH, REFUND_PATH, REFUND_SERVICE_BASE_URL,
    REFUND_STATUS_PATH, REFUND_V2_CREATE_PATH, REFUND_V2_STATE_PATH, XML_CONTENT_TYPE,
};
use crate::error::ClientError;

/// Gateway endpoint URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    /// Payment page.
    pub payment: Url,
    /// `POST` invoice creation.
    pub create_invoice: Url,
    /// `POST` refund.
    pub refund: Url,
    /// `POST` refund status.
    pub refund_status: Url,
    /// `POST` refund service creation.
    pub refund_v2_create: Url,
    /// `GET` refund service state.
    pub refund_v2_state: Url,
}

impl Endpoints {
    /// Returns the production endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if a default URL fails to parse.
    pub fn robokassa() -> Result<Self, ClientError> {
        let merchant = parse_base(MERCHANT_BASE_URL)?;
        let refund_service = parse_base(REFUND_SERVICE_BASE_URL)?;
        Self::try_new(&merchant, &refund_service)
    }

    /// Builds endpoints relative to a merchant host and a refund service host.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if URL construction fails.
    pub fn try_new(merchant_base: &Url, refund_service_base: &Url) -> Result<Self, ClientError> {
        Ok(Self {
            payment: join(merchant_base, PAYMENT_PATH, "Failed to construct payment URL")?,
            create_invoice: join(
                merchant_base,
                CREATE_INVOICE_PATH,
                "Failed to construct CreateInvoice URL",
            )?,
            refund: join(merchant_base, REFUND_PATH, "Failed to construct Refund URL")?,
            refund_status: join(
                merchant_base,
                REFUND_STATUS_PATH,
                "Failed to construct RefundStatus URL",
            )?,
            refund_v2_create: join(
                refund_service_base,
                REFUND_V2_CREATE_PATH,
                "Failed to construct Refund/Create URL",
            )?,
            refund_v2_state: join(
                refund_service_base,
                REFUND_V2_STATE_PATH,
                "Failed to construct Refund/GetState URL",
            )?,
        })
    }

    /// Builds every endpoint relative to a single host, as used by test
    /// servers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if URL construction fails.
    pub fn try_from_base(base_url: &Url) -> Result<Self, ClientError> {
        Self::try_new(base_url, base_url)
    }
}

impl TryFrom<&str> for Endpoints {
    type Error = ClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from_base(&parse_base(value)?)
    }
}

fn parse_base(value: &str) -> Result<Url, ClientError> {
    let mut normalized = value.trim_end_matches('/').to_owned();
    normalized.push('/');
    Url::parse(&normalized).map_err(|e| ClientError::UrlParse {
        context: "Failed to parse base url",
        source: e,
    })
}

fn join(base: &Url, path: &str, context: &'static str) -> Result<Url, ClientError> {
    base.join(path)
        .map_err(|e| ClientError::UrlParse { context, source: e })
}

/// A client for the RoboKassa gateway.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use robokassa::{Credentials, RefundRequest};
/// use robokassa_http::RoboKassaClient;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Credentials::new("demo", "pass1", "pass2")?;
/// let client = RoboKassaClient::new(credentials)?;
/// let response = client.create_refund(&RefundRequest::full(12345)).await?;
/// assert_eq!(response.code(), Some("0"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RoboKassaClient {
    credentials: Credentials,
    endpoints: Endpoints,
    client: Client,
    timeout: Option<Duration>,
}

impl RoboKassaClient {
    /// Creates a client for the production gateway.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if the default endpoints fail to parse.
    pub fn new(credentials: Credentials) -> Result<Self, ClientError> {
        Ok(Self::with_endpoints(credentials, Endpoints::robokassa()?))
    }

    /// Creates a client for custom endpoints.
    #[must_use]
    pub fn with_endpoints(credentials: Credentials, endpoints: Endpoints) -> Self {
        Self {
            credentials,
            endpoints,
            client: Client::new(),
            timeout: None,
        }
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses a pre-configured reqwest client.
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the configured credentials.
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the configured endpoints.
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Returns the configured timeout, if any.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Builds a signed payment link.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Core`] if the payment page URL is unusable.
    pub fn create_payment_url(&self, request: &PaymentLinkRequest) -> Result<String, ClientError> {
        Ok(create_payment_url_with_base(
            self.endpoints.payment.as_str(),
            &self.credentials,
            request,
        )?)
    }

    /// Verifies a ResultURL notification with password2.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Core`] if required fields are missing or
    /// malformed.
    pub fn verify_result_url<I, K, V>(&self, fields: I) -> Result<bool, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Notification::from_fields(fields)?.verify_result(&self.credentials)?)
    }

    /// Verifies a SuccessURL redirect with password1.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Core`] if required fields are missing or
    /// malformed.
    pub fn verify_success_url<I, K, V>(&self, fields: I) -> Result<bool, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Notification::from_fields(fields)?.verify_success(&self.credentials)?)
    }

    /// Sends `POST CreateInvoice`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure, malformed XML or a
    /// non-zero gateway code.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "robokassa.client.create_invoice",
            skip_all,
            fields(otel.status_code = tracing::field::Empty, error.message = tracing::field::Empty),
            err
        )
    )]
    pub async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> Result<XmlResponse, ClientError> {
        self.post_xml(
            &self.endpoints.create_invoice,
            "POST CreateInvoice",
            "Invoice creation failed",
            request,
        )
        .await
    }

    /// Sends `POST Refund`. Without an amount the whole payment is refunded.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure, malformed XML or a
    /// non-zero gateway code.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "robokassa.client.create_refund",
            skip_all,
            fields(
                invoice_id = request.invoice_id(),
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty
            ),
            err
        )
    )]
    pub async fn create_refund(&self, request: &RefundRequest) -> Result<XmlResponse, ClientError> {
        self.post_xml(&self.endpoints.refund, "POST Refund", "Refund failed", request)
            .await
    }

    /// Sends `POST RefundStatus`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure, malformed XML or a
    /// non-zero gateway code.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "robokassa.client.get_refund_status",
            skip_all,
            fields(otel.status_code = tracing::field::Empty, error.message = tracing::field::Empty),
            err
        )
    )]
    pub async fn get_refund_status(
        &self,
        request: &RefundStatusRequest,
    ) -> Result<XmlResponse, ClientError> {
        self.post_xml(
            &self.endpoints.refund_status,
            "POST RefundStatus",
            "Refund status request failed",
            request,
        )
        .await
    }

    /// Sends `POST Refund/Create` with a signed refund token.
    ///
    /// Fails before any network call if password3 is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on missing password3, transport failure or
    /// `success: false`.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "robokassa.client.create_refund_v2",
            skip_all,
            fields(otel.status_code = tracing::field::Empty, error.message = tracing::field::Empty),
            err
        )
    )]
    pub async fn create_refund_v2(
        &self,
        request: &RefundV2Request,
    ) -> Result<RefundCreated, ClientError> {
        let token = refund::encode_refund_token(&self.credentials, request)?;
        let context = "POST Refund/Create";

        let mut req = self
            .client
            .post(self.endpoints.refund_v2_create.clone())
            .json(token.as_str());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ClientError::Http { context, source: e })?;

        let result = match read_json::<RefundCreateResponse>(http_response, context).await {
            Ok(body) => RefundCreated::try_from(body).map_err(ClientError::from),
            Err(e) => Err(e),
        };
        record_result_on_span(&result);
        result
    }

    /// Sends `GET Refund/GetState?id=<request_id>`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure or a body without
    /// `requestId` and `label`.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "robokassa.client.get_refund_status_v2",
            skip_all,
            fields(
                request_id = request_id,
                otel.status_code = tracing::field::Empty,
                error.message = tracing::field::Empty
            ),
            err
        )
    )]
    pub async fn get_refund_status_v2(
        &self,
        request_id: &str,
    ) -> Result<RefundStatus, ClientError> {
        let context = "GET Refund/GetState";
        let mut url = self.endpoints.refund_v2_state.clone();
        url.query_pairs_mut().append_pair("id", request_id);

        let mut req = self.client.get(url);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ClientError::Http { context, source: e })?;

        let result = match read_json::<RefundStateResponse>(http_response, context).await {
            Ok(body) => RefundStatus::try_from(body).map_err(ClientError::from),
            Err(e) => Err(e),
        };
        record_result_on_span(&result);
        result
    }

    /// POSTs a signed XML document and validates the XML answer.
    ///
    /// `context` names the call in transport errors, `failure` prefixes
    /// gateway-reported errors.
    async fn post_xml<T: XmlRequest + Sync>(
        &self,
        url: &Url,
        context: &'static str,
        failure: &str,
        request: &T,
    ) -> Result<XmlResponse, ClientError> {
        let body = request.to_xml(&self.credentials)?;

        let mut req = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ClientError::Http { context, source: e })?;

        let status = http_response.status();
        let text = http_response
            .text()
            .await
            .map_err(|e| ClientError::ResponseBodyRead { context, source: e })?;

        let result = if status.is_success() {
            xml::validate_response(&text, failure).map_err(ClientError::from)
        } else {
            Err(ClientError::HttpStatus {
                context,
                status,
                body: text,
            })
        };

        record_result_on_span(&result);

        result
    }
}

async fn read_json<R>(
    http_response: reqwest::Response,
    context: &'static str,
) -> Result<R, ClientError>
where
    R: serde::de::DeserializeOwned,
{
    if http_response.status() == StatusCode::OK {
        http_response
            .json::<R>()
            .await
            .map_err(|e| ClientError::JsonDeserialization { context, source: e })
    } else {
        let status = http_response.status();
        let body = http_response
            .text()
            .await
            .map_err(|e| ClientError::ResponseBodyRead { context, source: e })?;
        Err(ClientError::HttpStatus {
            context,
            status,
            body,
        })
    }
}

/// Records the outcome of a request on the current span.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to gateway failed");
        }
    }
}

/// Records the outcome of a request on the current span.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}
