//! Rates command - show crypto prices in a fiat currency

use anyhow::Result;
use kioskpay_lib::ClientConfig;

use crate::ui;

pub async fn run(
    config: ClientConfig,
    base: Option<&str>,
    currencies: &[String],
    verbose: bool,
) -> Result<()> {
    let base = base
        .map(str::to_uppercase)
        .unwrap_or_else(|| config.jurisdiction.rule().currency.to_string());
    let currencies: Vec<String> = currencies.iter().map(|c| c.trim().to_uppercase()).collect();
    let (client, mut events) = super::connect(config)?;

    let spinner = ui::spinner("Fetching exchange rates...");
    let result = client.exchange_rates(&base, &currencies).await;
    spinner.finish_and_clear();

    match result {
        Ok(rates) => {
            ui::header(&format!("Exchange Rates ({})", rates.base_currency));
            if rates.rates.is_empty() {
                ui::warning("Provider returned no rates");
            }
            for (symbol, rate) in &rates.rates {
                ui::key_value(symbol, &rate.to_string());
            }
        }
        Err(err) => ui::error(&format!("Failed to fetch exchange rates: {}", err)),
    }

    if verbose {
        super::print_pending_events(&mut events);
    }
    Ok(())
}
