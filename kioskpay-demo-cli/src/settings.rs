//! Config loading for the demo.
//!
//! Order: `--config <file>`, then `<config dir>/kioskpay/config.json` if it
//! exists, then `KIOSKPAY_*` environment variables.

use anyhow::{Context, Result};
use kioskpay_lib::ClientConfig;
use std::path::{Path, PathBuf};

/// `<config dir>/kioskpay/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kioskpay").join("config.json"))
}

/// Parse a JSON config file.
pub fn load_file(path: &Path) -> Result<ClientConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: ClientConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Resolve the configuration for this run.
pub fn load(explicit: Option<&Path>) -> Result<ClientConfig> {
    if let Some(path) = explicit {
        return load_file(path);
    }

    if let Some(path) = default_config_path().filter(|p| p.exists()) {
        tracing::debug!(path = %path.display(), "using default config file");
        return load_file(&path);
    }

    let config = ClientConfig::from_env().context(
        "No configuration found. Pass --config <file> or set KIOSKPAY_API_KEY, \
         KIOSKPAY_MERCHANT_ID and KIOSKPAY_COUNTRY",
    )?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kioskpay_lib::Jurisdiction;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_file_with_defaults() {
        let file = write_config(
            r#"{ "api_key": "sk_test", "merchant_id": "kiosk-9", "country": "SG" }"#,
        );
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.jurisdiction, Jurisdiction::Singapore);
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.supported_cryptocurrencies.len(), 5);
        assert!(config.webhook.is_none());
    }

    #[test]
    fn test_load_file_with_webhook() {
        let file = write_config(
            r#"{
                "api_key": "sk_test",
                "merchant_id": "kiosk-9",
                "jurisdiction": "Vietnam",
                "test_mode": true,
                "webhook": { "endpoint": "https://kiosk/hook", "secret": "whsec" }
            }"#,
        );
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.jurisdiction, Jurisdiction::Vietnam);
        assert!(config.test_mode);
        assert_eq!(config.webhook_secret(), Some("whsec"));
    }

    #[test]
    fn test_unknown_country_rejected() {
        let file = write_config(r#"{ "api_key": "k", "merchant_id": "m", "country": "JP" }"#);
        assert!(load(Some(file.path())).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config(
            r#"{ "api_key": "", "merchant_id": "m", "country": "MY" }"#,
        );
        let err = load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
