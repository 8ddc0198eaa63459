//! Jurisdictions command - print the KYC rule table

use anyhow::Result;
use kioskpay_lib::{Jurisdiction, KycField};

use crate::ui;

pub fn run(verbose: bool) -> Result<()> {
    ui::header("Supported Jurisdictions");

    for jurisdiction in Jurisdiction::ALL {
        let rule = jurisdiction.rule();
        ui::separator();
        println!("  {} ({})", rule.country_name, rule.country_code);
        ui::key_value("Currency", rule.currency);
        ui::key_value(
            "KYC from",
            &format!("{} {}", rule.kyc_threshold, rule.currency),
        );
        let fields: Vec<&str> = rule.required_fields.iter().map(KycField::label).collect();
        ui::key_value("KYC fields", &fields.join(", "));
        if let Some(threshold) = rule.travel_rule_threshold {
            ui::key_value("Travel rule from", &format!("{} {}", threshold, rule.currency));
        }
        if verbose {
            ui::key_value("Regulator", rule.regulator);
        }
    }

    Ok(())
}
