//! Per-country KYC rules for the eight supported jurisdictions.
//!
//! Each jurisdiction has a local currency, a regulator and a KYC threshold.
//! Payments priced in that local currency at or above the threshold must
//! carry the customer's identity. Singapore additionally flags payments of
//! 1,000 SGD or more for the travel rule; the flag is advisory and never
//! blocks the payment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::amount::Amount;
use crate::models::PaymentDetails;
use crate::{KioskPayError, Result};

/// Supported countries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Jurisdiction {
    Malaysia,
    Singapore,
    Indonesia,
    Thailand,
    Brunei,
    Cambodia,
    Vietnam,
    Laos,
}

impl Jurisdiction {
    /// Every supported jurisdiction, in table order.
    pub const ALL: [Jurisdiction; 8] = [
        Jurisdiction::Malaysia,
        Jurisdiction::Singapore,
        Jurisdiction::Indonesia,
        Jurisdiction::Thailand,
        Jurisdiction::Brunei,
        Jurisdiction::Cambodia,
        Jurisdiction::Vietnam,
        Jurisdiction::Laos,
    ];

    /// ISO 3166-1 alpha-2 code sent as `country_code`.
    pub fn code(&self) -> &'static str {
        self.rule().country_code
    }

    /// The compliance rule for this jurisdiction.
    pub fn rule(&self) -> ComplianceRule {
        rule_for(*self)
    }
}

impl FromStr for Jurisdiction {
    type Err = KioskPayError;

    /// Accepts the two-letter code or the country name, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|j| {
                let rule = j.rule();
                wanted.eq_ignore_ascii_case(rule.country_code)
                    || wanted.eq_ignore_ascii_case(rule.country_name)
            })
            .ok_or_else(|| {
                KioskPayError::configuration("country", format!("unsupported country '{}'", s))
            })
    }
}

impl TryFrom<String> for Jurisdiction {
    type Error = KioskPayError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Jurisdiction> for String {
    fn from(value: Jurisdiction) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rule().country_name)
    }
}

/// Customer identity fields a KYC rule can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KycField {
    CustomerName,
    CustomerEmail,
}

impl KycField {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CustomerName => "name",
            Self::CustomerEmail => "email",
        }
    }

    fn is_present(&self, details: &PaymentDetails) -> bool {
        match self {
            Self::CustomerName => details.customer_name().is_some(),
            Self::CustomerEmail => details.customer_email().is_some(),
        }
    }
}

/// Regulatory parameters of one jurisdiction.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceRule {
    pub jurisdiction: Jurisdiction,
    pub country_name: &'static str,
    pub country_code: &'static str,
    pub currency: &'static str,
    pub regulator: &'static str,
    /// Payments at or above this amount (in `currency`) need KYC.
    pub kyc_threshold: Amount,
    pub required_fields: &'static [KycField],
    /// Payments at or above this amount are flagged for the travel rule.
    pub travel_rule_threshold: Option<Amount>,
}

const NAME_ONLY: &[KycField] = &[KycField::CustomerName];
const NAME_AND_EMAIL: &[KycField] = &[KycField::CustomerName, KycField::CustomerEmail];

/// Look up the rule for a jurisdiction. Total over all variants.
pub fn rule_for(jurisdiction: Jurisdiction) -> ComplianceRule {
    let (country_name, country_code, currency, regulator, threshold, required_fields, travel) =
        match jurisdiction {
            Jurisdiction::Malaysia => (
                "Malaysia",
                "MY",
                "MYR",
                "Securities Commission Malaysia (SC)",
                3_000,
                NAME_ONLY,
                None,
            ),
            Jurisdiction::Singapore => (
                "Singapore",
                "SG",
                "SGD",
                "Monetary Authority of Singapore (MAS)",
                1_000,
                NAME_AND_EMAIL,
                Some(1_000),
            ),
            Jurisdiction::Indonesia => (
                "Indonesia",
                "ID",
                "IDR",
                "Commodity Futures Trading Regulatory Agency (Bappebti)",
                2_000_000,
                NAME_ONLY,
                None,
            ),
            Jurisdiction::Thailand => (
                "Thailand",
                "TH",
                "THB",
                "Securities and Exchange Commission (SEC)",
                50_000,
                NAME_ONLY,
                None,
            ),
            Jurisdiction::Brunei => (
                "Brunei",
                "BN",
                "BND",
                "Autoriti Monetari Brunei Darussalam (AMBD)",
                5_000,
                NAME_ONLY,
                None,
            ),
            Jurisdiction::Cambodia => (
                "Cambodia",
                "KH",
                "KHR",
                "National Bank of Cambodia (NBC)",
                4_000_000,
                NAME_ONLY,
                None,
            ),
            Jurisdiction::Vietnam => (
                "Vietnam",
                "VN",
                "VND",
                "State Bank of Vietnam (SBV)",
                20_000_000,
                NAME_ONLY,
                None,
            ),
            Jurisdiction::Laos => (
                "Laos",
                "LA",
                "LAK",
                "Bank of the Lao PDR (BOL)",
                9_000_000,
                NAME_ONLY,
                None,
            ),
        };

    ComplianceRule {
        jurisdiction,
        country_name,
        country_code,
        currency,
        regulator,
        kyc_threshold: Amount::from_units(threshold),
        required_fields,
        travel_rule_threshold: travel.map(Amount::from_units),
    }
}

/// Result of a successful compliance check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplianceOutcome {
    /// The payment is priced in the jurisdiction's currency, so KYC rules were evaluated.
    pub kyc_evaluated: bool,
    /// The payment must carry travel-rule information (advisory).
    pub travel_rule_applies: bool,
}

/// Check payment details against a jurisdiction's KYC rule.
///
/// Only payments priced in the rule's own currency are evaluated; any other
/// currency passes untouched.
///
/// # Errors
///
/// Returns [`KioskPayError::Compliance`] when the amount reaches the KYC
/// threshold and a required identity field is missing or blank.
pub fn validate(details: &PaymentDetails, rule: &ComplianceRule) -> Result<ComplianceOutcome> {
    if details.currency != rule.currency {
        return Ok(ComplianceOutcome::default());
    }

    if details.amount >= rule.kyc_threshold
        && rule.required_fields.iter().any(|f| !f.is_present(details))
    {
        let fields: Vec<&str> = rule.required_fields.iter().map(KycField::label).collect();
        return Err(KioskPayError::Compliance(format!(
            "KYC information ({}) required for payments of {} {} or more in {}",
            fields.join(" and "),
            rule.kyc_threshold,
            rule.currency,
            rule.country_name
        )));
    }

    let travel_rule_applies = rule
        .travel_rule_threshold
        .is_some_and(|threshold| details.amount >= threshold);
    if travel_rule_applies {
        tracing::debug!(
            country = rule.country_code,
            amount = %details.amount,
            "travel rule applies to payment"
        );
    }

    Ok(ComplianceOutcome {
        kyc_evaluated: true,
        travel_rule_applies,
    })
}
