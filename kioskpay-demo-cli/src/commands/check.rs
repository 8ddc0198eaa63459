//! Check command - local validation, no network

use anyhow::Result;
use kioskpay_lib::{ClientConfig, PaymentRequestBuilder};

use crate::ui;
use crate::PaymentArgs;

pub fn run(config: ClientConfig, args: &PaymentArgs, verbose: bool) -> Result<()> {
    let details = super::payment_details(&config, args)?;
    let builder = PaymentRequestBuilder::new(&config);
    let rule = config.jurisdiction.rule();

    ui::header("Payment Check");
    ui::key_value("Jurisdiction", rule.country_name);
    ui::key_value(
        "Amount",
        &format!("{} {} in {}", details.amount, details.currency, details.crypto_currency),
    );

    match builder.check(&details) {
        Ok(outcome) => {
            if !outcome.kyc_evaluated {
                ui::info(&format!(
                    "Not priced in {}; KYC rules were not evaluated",
                    rule.currency
                ));
            }
            if outcome.travel_rule_applies {
                ui::warning("Travel rule information required for this payment");
            }
            ui::success("Payment passes local validation");

            if verbose {
                let signed = builder.build(&details)?;
                ui::separator();
                ui::key_value("Timestamp", &signed.timestamp);
                ui::key_value("Signature", &signed.signature);
                if let Some(body) = &signed.request.body {
                    println!("{}", body);
                }
            }
        }
        Err(err) => {
            ui::error(&err.to_string());
        }
    }

    Ok(())
}
