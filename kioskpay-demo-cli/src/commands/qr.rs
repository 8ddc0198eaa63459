//! QR command - download a payment QR code image

use anyhow::{Context, Result};
use kioskpay_lib::ClientConfig;
use std::path::Path;

use crate::ui;

pub async fn run(config: ClientConfig, url: &str, output: &Path, verbose: bool) -> Result<()> {
    let (client, mut events) = super::connect(config)?;

    let spinner = ui::spinner("Downloading QR code...");
    let result = client.download_qr_code(url).await;
    spinner.finish_and_clear();

    match result {
        Ok(bytes) => {
            std::fs::write(output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            ui::success(&format!(
                "Saved {} bytes to {}",
                bytes.len(),
                output.display()
            ));
        }
        Err(err) => ui::error(&format!("Failed to download QR code: {}", err)),
    }

    if verbose {
        super::print_pending_events(&mut events);
    }
    Ok(())
}
