//! CLI definition for the `robokassa` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use robokassa::SignatureAlgorithm;
use robokassa_proto::TaxRate;
use rust_decimal::Decimal;

/// RoboKassa gateway client.
#[derive(Parser, Debug)]
#[command(name = "robokassa")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "ROBOKASSA_CONFIG", default_value = "robokassa.toml")]
    pub config: PathBuf,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Gateway operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a signed payment link.
    PaymentUrl {
        /// Amount to pay.
        #[arg(long)]
        out_sum: Decimal,
        /// Order description shown to the customer.
        #[arg(long)]
        description: String,
        /// Merchant invoice number.
        #[arg(long)]
        inv_id: Option<u64>,
        /// Customer email.
        #[arg(long)]
        email: Option<String>,
        /// Payment page language (`ru` or `en`).
        #[arg(long)]
        culture: Option<String>,
        /// Link expiration date.
        #[arg(long)]
        expiration_date: Option<String>,
        /// Extension parameter `key=value`, sent as `Shp_key`.
        #[arg(long = "shp", value_parser = parse_key_value)]
        shp: Vec<(String, String)>,
        /// Signature algorithm override.
        #[arg(long)]
        algorithm: Option<SignatureAlgorithm>,
    },
    /// Verify a ResultURL or SuccessURL notification.
    Verify {
        /// Check a SuccessURL redirect (password1) instead of ResultURL.
        #[arg(long)]
        success: bool,
        /// Received field `key=value`.
        #[arg(value_parser = parse_key_value, required = true)]
        fields: Vec<(String, String)>,
    },
    /// Create an invoice through the XML web service.
    Invoice {
        /// Amount to pay.
        #[arg(long)]
        out_sum: Decimal,
        /// Order description.
        #[arg(long)]
        description: String,
        /// Merchant invoice number.
        #[arg(long)]
        inv_id: Option<u64>,
        /// Customer email.
        #[arg(long)]
        email: Option<String>,
        /// Invoice expiration date.
        #[arg(long)]
        expiration_date: Option<String>,
        /// Extension parameter `key=value`, sent as `Shp_key`.
        #[arg(long = "shp", value_parser = parse_key_value)]
        shp: Vec<(String, String)>,
        /// Signature algorithm override.
        #[arg(long)]
        algorithm: Option<SignatureAlgorithm>,
    },
    /// Refund a payment through the XML web service.
    Refund {
        /// Invoice to refund.
        #[arg(long)]
        invoice_id: u64,
        /// Partial amount; the whole payment is refunded when omitted.
        #[arg(long)]
        amount: Option<Decimal>,
        /// Signature algorithm override.
        #[arg(long)]
        algorithm: Option<SignatureAlgorithm>,
    },
    /// Query a refund through the XML web service.
    RefundStatus {
        /// Refunded invoice.
        #[arg(long)]
        invoice_id: u64,
        /// Signature algorithm override.
        #[arg(long)]
        algorithm: Option<SignatureAlgorithm>,
    },
    /// Request a refund from the token-based refund service.
    RefundV2 {
        /// Operation key of the payment.
        #[arg(long)]
        op_key: String,
        /// Partial amount; the whole payment is refunded when omitted.
        #[arg(long)]
        refund_sum: Option<Decimal>,
        /// Receipt item `name;quantity;cost;tax`.
        #[arg(long = "item", value_parser = parse_item)]
        items: Vec<ItemArg>,
        /// Signature algorithm override.
        #[arg(long)]
        algorithm: Option<SignatureAlgorithm>,
    },
    /// Query a refund from the token-based refund service.
    RefundStatusV2 {
        /// Identifier returned by `refund-v2`.
        #[arg(long)]
        request_id: String,
    },
}

/// A receipt item as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemArg {
    /// Item name.
    pub name: String,
    /// Quantity.
    pub quantity: Decimal,
    /// Unit cost.
    pub cost: Decimal,
    /// VAT rate.
    pub tax: TaxRate,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn parse_item(s: &str) -> Result<ItemArg, String> {
    let parts: Vec<&str> = s.split(';').collect();
    let [name, quantity, cost, tax] = parts.as_slice() else {
        return Err(format!("expected name;quantity;cost;tax, got {s:?}"));
    };
    Ok(ItemArg {
        name: (*name).to_owned(),
        quantity: quantity
            .trim()
            .parse()
            .map_err(|e| format!("invalid quantity {quantity:?}: {e}"))?,
        cost: cost
            .trim()
            .parse()
            .map_err(|e| format!("invalid cost {cost:?}: {e}"))?,
        tax: tax.parse().map_err(|e| format!("{e}"))?,
    })
}
