//! Sign command - compute request or webhook signatures

use anyhow::{bail, Result};
use kioskpay_lib::signing;

use crate::ui;

/// `timestamp.payload` when a timestamp is given (request signatures),
/// the bare payload otherwise (webhook signatures).
pub fn signature(payload: &str, timestamp: Option<&str>, secret: &str) -> Result<String> {
    if secret.is_empty() {
        bail!("Signing secret must not be empty");
    }
    Ok(match timestamp {
        Some(ts) => signing::sign(payload, ts.trim(), secret),
        None => signing::sign_payload(payload, secret),
    })
}

pub fn run(payload: &str, timestamp: Option<&str>, secret: &str, verbose: bool) -> Result<()> {
    let sig = signature(payload, timestamp, secret)?;

    if verbose {
        ui::header("Signature");
        if let Some(ts) = timestamp {
            ui::key_value("Timestamp", ts);
        }
        ui::key_value("Payload bytes", &payload.len().to_string());
    }
    println!("{}", sig);
    Ok(())
}
