//! Command-line client for the RoboKassa payment gateway.
//!
//! # Usage
//!
//! ```bash
//! # Print a signed payment link
//! robokassa payment-url --out-sum 100.00 --description "Order 42" --inv-id 42
//!
//! # Verify a ResultURL notification
//! robokassa verify OutSum=100.00 InvId=42 SignatureValue=... Shp_user=7
//!
//! # Partial refund through the refund service
//! robokassa refund-v2 --op-key 3f7a... --refund-sum 50.25 --item "Tea;1;50.25;vat20"
//!
//! # Configure logging level
//! RUST_LOG=debug robokassa refund-status --invoice-id 42
//! ```
//!
//! # Environment Variables
//!
//! - `ROBOKASSA_CONFIG` - Path to TOML configuration file (default: `robokassa.toml`)
//! - `ROBOKASSA_*` - Credential overrides, see [`config`]
//! - `RUST_LOG` - Log level filter (default: `info`)

mod cli;
mod config;

use clap::Parser;
use robokassa::payment::PaymentLinkRequest;
use robokassa::refund::{self, RefundV2Request};
use robokassa::xml::{InvoiceRequest, RefundRequest, RefundStatusRequest, XmlResponse};
use robokassa_http::{Endpoints, RoboKassaClient};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::CliConfig;

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {e}");
    }

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::load_from(&cli.config.to_string_lossy())?;
    tracing::debug!(?config, "Loaded configuration");

    let credentials = config.credentials()?;
    let client = match &config.base_url {
        Some(base) => {
            RoboKassaClient::with_endpoints(credentials, Endpoints::try_from(base.as_str())?)
        }
        None => RoboKassaClient::new(credentials)?,
    };
    let client = match config.timeout() {
        Some(timeout) => client.with_timeout(timeout),
        None => client,
    };

    let output = match cli.command {
        Command::PaymentUrl {
            out_sum,
            description,
            inv_id,
            email,
            culture,
            expiration_date,
            shp,
            algorithm,
        } => {
            let mut request = PaymentLinkRequest::new(out_sum, description)?;
            if let Some(inv_id) = inv_id {
                request = request.with_inv_id(inv_id);
            }
            if let Some(email) = email {
                request = request.with_email(email);
            }
            if let Some(culture) = culture {
                request = request.with_culture(culture);
            }
            if let Some(date) = expiration_date {
                request = request.with_expiration_date(date);
            }
            for (key, value) in shp {
                request = request.with_user_parameter(&key, value)?;
            }
            if let Some(algorithm) = algorithm {
                request = request.with_algorithm(algorithm);
            }
            json!({ "url": client.create_payment_url(&request)? })
        }
        Command::Verify { success, fields } => {
            let valid = if success {
                client.verify_success_url(fields)?
            } else {
                client.verify_result_url(fields)?
            };
            if !valid {
                tracing::warn!("Signature mismatch");
            }
            json!({ "valid": valid })
        }
        Command::Invoice {
            out_sum,
            description,
            inv_id,
            email,
            expiration_date,
            shp,
            algorithm,
        } => {
            let mut request = InvoiceRequest::new(out_sum, description)?;
            if let Some(inv_id) = inv_id {
                request = request.with_inv_id(inv_id);
            }
            if let Some(email) = email {
                request = request.with_email(email);
            }
            if let Some(date) = expiration_date {
                request = request.with_expiration_date(date);
            }
            for (key, value) in shp {
                request = request.with_user_parameter(&key, value)?;
            }
            if let Some(algorithm) = algorithm {
                request = request.with_algorithm(algorithm);
            }
            xml_output(&client.create_invoice(&request).await?)
        }
        Command::Refund {
            invoice_id,
            amount,
            algorithm,
        } => {
            let mut request = RefundRequest::new(invoice_id, amount)?;
            if let Some(algorithm) = algorithm {
                request = request.with_algorithm(algorithm);
            }
            tracing::info!(invoice_id, partial = amount.is_some(), "Requesting refund");
            xml_output(&client.create_refund(&request).await?)
        }
        Command::RefundStatus {
            invoice_id,
            algorithm,
        } => {
            let mut request = RefundStatusRequest::new(invoice_id);
            if let Some(algorithm) = algorithm {
                request = request.with_algorithm(algorithm);
            }
            xml_output(&client.get_refund_status(&request).await?)
        }
        Command::RefundV2 {
            op_key,
            refund_sum,
            items,
            algorithm,
        } => {
            let mut request = RefundV2Request::new(op_key)?;
            if let Some(sum) = refund_sum {
                request = request.with_refund_sum(sum)?;
            }
            for item in items {
                request = request.with_invoice_item(refund::invoice_item(
                    item.name,
                    item.quantity,
                    item.cost,
                    item.tax,
                )?);
            }
            if let Some(algorithm) = algorithm {
                request = request.with_algorithm(algorithm);
            }
            let created = client.create_refund_v2(&request).await?;
            json!({
                "success": created.success,
                "requestId": created.request_id,
                "message": created.message,
            })
        }
        Command::RefundStatusV2 { request_id } => {
            let status = client.get_refund_status_v2(&request_id).await?;
            json!({
                "requestId": status.request_id,
                "amount": status.amount.map(|a| a.to_string()),
                "label": status.label.as_str(),
                "rawLabel": status.raw_label,
                "message": status.message,
            })
        }
    };

    print_json(&output)
}

fn xml_output(response: &XmlResponse) -> serde_json::Value {
    json!({
        "root": response.root(),
        "fields": response.fields(),
    })
}

#[allow(clippy::print_stdout)]
fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
