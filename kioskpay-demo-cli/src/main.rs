//! KioskPay Demo CLI
//!
//! Command-line interface for exercising the KioskPay SDK against the
//! payment provider or its sandbox.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod settings;
mod ui;

#[derive(Parser)]
#[command(name = "kioskpay-demo")]
#[command(about = "KioskPay Demo CLI - Accept crypto payments at Southeast Asian kiosks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file (defaults to the user config dir, then KIOSKPAY_* env vars)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Fields shared by `check` and `create`.
#[derive(clap::Args)]
pub struct PaymentArgs {
    /// Fiat amount, e.g. 49.90
    #[arg(short, long)]
    amount: String,

    /// Cryptocurrency to pay with (BTC, ETH, USDT, USDC, BNB)
    #[arg(short = 'x', long, default_value = "USDT")]
    crypto: String,

    /// Fiat currency (defaults to the jurisdiction's currency)
    #[arg(short, long)]
    currency: Option<String>,

    /// Description shown to the customer
    #[arg(short, long)]
    description: Option<String>,

    /// Merchant order reference
    #[arg(long)]
    order_id: Option<String>,

    /// Customer name (KYC)
    #[arg(long)]
    name: Option<String>,

    /// Customer email (KYC)
    #[arg(long)]
    email: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the compliance rules of every supported country
    Jurisdictions,

    /// Validate a payment locally without contacting the provider
    Check {
        #[command(flatten)]
        payment: PaymentArgs,
    },

    /// Create a payment
    Create {
        #[command(flatten)]
        payment: PaymentArgs,

        /// Keep running and print status updates until the payment settles
        #[arg(short, long)]
        watch: bool,
    },

    /// Fetch a payment
    Get {
        /// Payment ID
        payment_id: String,
    },

    /// List payments
    List {
        /// Only payments in this status
        #[arg(short, long)]
        status: Option<String>,

        /// Earliest creation date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Latest creation date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Page size
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Page offset
        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// Cancel a payment
    Cancel {
        /// Payment ID
        payment_id: String,
    },

    /// Show exchange rates
    Rates {
        /// Fiat base currency (defaults to the jurisdiction's currency)
        #[arg(short, long)]
        base: Option<String>,

        /// Comma-separated cryptocurrencies (defaults to the supported set)
        #[arg(long, value_delimiter = ',')]
        currencies: Vec<String>,
    },

    /// Download a payment QR code image
    Qr {
        /// QR code URL from a payment
        url: String,

        /// Output file
        #[arg(short, long, default_value = "qr.png")]
        output: PathBuf,
    },

    /// Verify and dispatch a webhook delivery saved to a file
    VerifyWebhook {
        /// File holding the raw webhook body
        body_file: PathBuf,

        /// Signature header value
        #[arg(short, long)]
        signature: String,
    },

    /// Compute an HMAC-SHA256 signature
    Sign {
        /// Payload to sign
        payload: String,

        /// Millisecond timestamp to bind into the signature
        #[arg(short, long)]
        timestamp: Option<String>,

        /// Secret (defaults to the configured API key)
        #[arg(long)]
        secret: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("kioskpay_demo_cli=debug,kioskpay_lib=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "kioskpay_demo_cli=info,kioskpay_lib=warn".into()),
            )
            .init();
    }

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Jurisdictions => {
            commands::jurisdictions::run(cli.verbose)?;
        }
        Commands::Check { payment } => {
            let config = settings::load(config_path)?;
            commands::check::run(config, &payment, cli.verbose)?;
        }
        Commands::Create { payment, watch } => {
            let config = settings::load(config_path)?;
            commands::create::run(config, &payment, watch, cli.verbose).await?;
        }
        Commands::Get { payment_id } => {
            let config = settings::load(config_path)?;
            commands::payments::get(config, &payment_id, cli.verbose).await?;
        }
        Commands::List {
            status,
            from,
            to,
            limit,
            offset,
        } => {
            let config = settings::load(config_path)?;
            let query = commands::payments::ListQuery {
                status,
                from,
                to,
                limit,
                offset,
            };
            commands::payments::list(config, &query, cli.verbose).await?;
        }
        Commands::Cancel { payment_id } => {
            let config = settings::load(config_path)?;
            commands::payments::cancel(config, &payment_id, cli.verbose).await?;
        }
        Commands::Rates { base, currencies } => {
            let config = settings::load(config_path)?;
            commands::rates::run(config, base.as_deref(), &currencies, cli.verbose).await?;
        }
        Commands::Qr { url, output } => {
            let config = settings::load(config_path)?;
            commands::qr::run(config, &url, &output, cli.verbose).await?;
        }
        Commands::VerifyWebhook {
            body_file,
            signature,
        } => {
            let config = settings::load(config_path)?;
            commands::webhook::run(config, &body_file, &signature, cli.verbose)?;
        }
        Commands::Sign {
            payload,
            timestamp,
            secret,
        } => {
            let secret = match secret {
                Some(secret) => secret,
                None => settings::load(config_path)?.api_key,
            };
            commands::sign::run(&payload, timestamp.as_deref(), &secret, cli.verbose)?;
        }
    }

    Ok(())
}
